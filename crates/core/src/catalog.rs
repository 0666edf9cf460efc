//! Course catalog: the single course record and the FAQ answers derived from it.
//!
//! Both are built once at startup and shared read-only afterwards. The FAQ
//! table is an ordered list on purpose: when a message mentions several
//! keywords, the keyword defined first wins.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    pub name: String,
    pub duration: String,
    pub price: String,
    pub instructor: String,
    pub format: String,
    pub schedule: String,
    pub description: String,
    pub benefits: Vec<String>,
    pub prerequisites: String,
    pub support: String,
}

impl Default for CourseInfo {
    fn default() -> Self {
        Self {
            name: "Complete Python Development Bootcamp".to_string(),
            duration: "12 weeks (3 months)".to_string(),
            price: "$299".to_string(),
            instructor: "John Smith".to_string(),
            format: "Online with live sessions".to_string(),
            schedule: "Monday, Wednesday, Friday - 7:00 PM to 9:00 PM EST".to_string(),
            description: "A comprehensive Python development course covering web development, data science, and automation".to_string(),
            benefits: vec![
                "Learn Python from beginner to advanced level".to_string(),
                "Build real-world projects including web applications".to_string(),
                "Get hands-on experience with popular Python frameworks".to_string(),
                "Receive a certificate of completion".to_string(),
                "Access to lifetime course materials".to_string(),
                "1-on-1 mentorship sessions".to_string(),
                "Job placement assistance".to_string(),
            ],
            prerequisites: "No prior programming experience required".to_string(),
            support: "24/7 support via email and Discord community".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaqEntry {
    pub keyword: String,
    pub answer: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaqTable {
    entries: Vec<FaqEntry>,
}

impl FaqTable {
    /// Builds a table from `(keyword, answer)` pairs, preserving their order.
    ///
    /// Keywords must be non-empty, lowercase and unique.
    pub fn from_entries<I, K, A>(entries: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: Into<String>,
    {
        let mut table = Vec::new();
        for (keyword, answer) in entries {
            let keyword = keyword.into();
            if keyword.trim().is_empty() {
                return Err(DomainError::InvariantViolation(
                    "faq keyword must not be empty".to_string(),
                ));
            }
            if keyword != keyword.to_lowercase() {
                return Err(DomainError::InvariantViolation(format!(
                    "faq keyword `{keyword}` must be lowercase"
                )));
            }
            if table.iter().any(|entry: &FaqEntry| entry.keyword == keyword) {
                return Err(DomainError::InvariantViolation(format!(
                    "faq keyword `{keyword}` is defined more than once"
                )));
            }
            table.push(FaqEntry { keyword, answer: answer.into() });
        }
        Ok(Self { entries: table })
    }

    /// The standard answers for `course`, in match priority order.
    pub fn for_course(course: &CourseInfo) -> Result<Self, DomainError> {
        Self::from_entries([
            ("duration", format!("The course duration is {}.", course.duration)),
            (
                "price",
                format!(
                    "The course price is {}. We also offer payment plans if needed.",
                    course.price
                ),
            ),
            ("benefits", format!("Course benefits include: {}", course.benefits.join(", "))),
            ("schedule", format!("Classes are held {}.", course.schedule)),
            ("prerequisites", format!("Prerequisites: {}", course.prerequisites)),
            (
                "instructor",
                format!("Your instructor will be {}, an experienced developer.", course.instructor),
            ),
            ("format", format!("The course format is {}.", course.format)),
            ("support", format!("We provide {}.", course.support)),
            (
                "registration",
                "To register, please use the /register endpoint and provide your name, email, and phone number.".to_string(),
            ),
            (
                "certificate",
                "Yes, you will receive a certificate of completion after successfully finishing the course.".to_string(),
            ),
        ])
    }

    pub fn entries(&self) -> &[FaqEntry] {
        &self.entries
    }

    /// Returns the first entry whose keyword occurs anywhere in `message`,
    /// compared case-insensitively.
    pub fn match_message(&self, message: &str) -> Option<&FaqEntry> {
        let lowered = message.to_lowercase();
        self.entries.iter().find(|entry| lowered.contains(entry.keyword.as_str()))
    }
}

impl Serialize for FaqTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.keyword, &entry.answer)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CourseCatalog {
    pub course: CourseInfo,
    pub faqs: FaqTable,
}

impl CourseCatalog {
    pub fn new(course: CourseInfo) -> Result<Self, DomainError> {
        let faqs = FaqTable::for_course(&course)?;
        Ok(Self { course, faqs })
    }
}

#[cfg(test)]
mod tests {
    use super::{CourseCatalog, CourseInfo, FaqTable};
    use crate::errors::DomainError;

    fn catalog(course: CourseInfo) -> CourseCatalog {
        CourseCatalog::new(course).expect("course catalog should validate")
    }

    fn answer<'a>(catalog: &'a CourseCatalog, keyword: &str) -> &'a str {
        catalog
            .faqs
            .entries()
            .iter()
            .find(|entry| entry.keyword == keyword)
            .map(|entry| entry.answer.as_str())
            .unwrap_or_else(|| panic!("faq `{keyword}` should exist"))
    }

    #[test]
    fn default_table_keeps_definition_order() {
        let catalog = catalog(CourseInfo::default());
        let keywords =
            catalog.faqs.entries().iter().map(|entry| entry.keyword.as_str()).collect::<Vec<_>>();

        assert_eq!(
            keywords,
            vec![
                "duration",
                "price",
                "benefits",
                "schedule",
                "prerequisites",
                "instructor",
                "format",
                "support",
                "registration",
                "certificate",
            ]
        );
    }

    #[test]
    fn answers_are_derived_from_course_fields() {
        let catalog =
            catalog(CourseInfo { price: "$499".to_string(), ..CourseInfo::default() });

        assert!(answer(&catalog, "price").contains("$499"));
        assert!(answer(&catalog, "benefits").contains("Job placement"));
    }

    #[test]
    fn overridden_course_still_builds_a_validated_table() {
        let course = CourseInfo {
            name: "Rust for Backend Engineers".to_string(),
            instructor: "Ada Lovelace".to_string(),
            benefits: vec![],
            ..CourseInfo::default()
        };
        let catalog = catalog(course);

        assert_eq!(catalog.faqs.entries().len(), 10);
        assert!(answer(&catalog, "instructor").contains("Ada Lovelace"));
    }

    #[test]
    fn first_defined_keyword_wins_when_several_match() {
        let catalog = catalog(CourseInfo::default());

        let entry = catalog
            .faqs
            .match_message("What's the SCHEDULE and the Price?")
            .expect("a keyword should match");
        assert_eq!(entry.keyword, "price");
    }

    #[test]
    fn matching_is_substring_based() {
        let catalog = catalog(CourseInfo::default());

        let entry = catalog.faqs.match_message("tell me about pricing").expect("match");
        assert_eq!(entry.keyword, "price");
        assert!(catalog.faqs.match_message("can I pay in bitcoin?").is_none());
    }

    #[test]
    fn rejects_duplicate_and_uppercase_keywords() {
        let duplicate = FaqTable::from_entries([("price", "a"), ("price", "b")]);
        assert!(matches!(duplicate, Err(DomainError::InvariantViolation(_))));

        let uppercase = FaqTable::from_entries([("Price", "a")]);
        assert!(matches!(uppercase, Err(DomainError::InvariantViolation(_))));

        let table = FaqTable::from_entries([("refund", "30 days"), ("price", "$1")])
            .expect("valid table");
        assert_eq!(table.entries().len(), 2);
        assert_eq!(table.entries()[0].keyword, "refund");
    }

    #[test]
    fn serializes_as_ordered_object() {
        let table = FaqTable::from_entries([("zeta", "last"), ("alpha", "first")])
            .expect("valid table");
        let json = serde_json::to_string(&table).expect("serialize");

        assert_eq!(json, r#"{"zeta":"last","alpha":"first"}"#);
    }
}
