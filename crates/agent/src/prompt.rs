//! Fixed reply texts and the system prompt, all rendered from the course record.

use coursebot_core::catalog::CourseInfo;

/// Tokens that mark a first message as a greeting (substring match).
pub const GREETING_TOKENS: [&str; 5] = ["hello", "hi", "hey", "start", "help"];

pub const APOLOGY_UNAVAILABLE: &str =
    "I'm sorry, the AI service is not available right now. Please try again later or contact support.";

pub const APOLOGY_FAILURE: &str = "I'm sorry, I'm having trouble processing your request right now. Please try again or contact our support team for assistance.";

pub const EMPTY_COMPLETION: &str = "I'm sorry, I couldn't generate a response.";

pub const START_COMMAND: &str = "/start";

const START_BENEFIT_COUNT: usize = 5;

pub fn system_prompt(course: &CourseInfo) -> String {
    let benefits =
        course.benefits.iter().map(|benefit| format!("- {benefit}")).collect::<Vec<_>>().join("\n");

    format!(
        "You are a helpful AI assistant for the \"{name}\" course.\n\
         \n\
         COURSE DETAILS:\n\
         - Course Name: {name}\n\
         - Duration: {duration}\n\
         - Price: {price}\n\
         - Instructor: {instructor}\n\
         - Format: {format}\n\
         - Schedule: {schedule}\n\
         - Prerequisites: {prerequisites}\n\
         - Support: {support}\n\
         \n\
         COURSE BENEFITS:\n\
         {benefits}\n\
         \n\
         COURSE DESCRIPTION:\n\
         {description}\n\
         \n\
         Your role is to:\n\
         1. Greet users warmly and introduce the course\n\
         2. Answer questions about the course details, pricing, schedule, benefits, etc.\n\
         3. Help users with the registration process\n\
         4. Be friendly, informative, and encouraging\n\
         5. If asked about registration, guide them to provide their name, email, and phone number\n\
         \n\
         Keep responses conversational and helpful. If you don't know something specific about the course, refer them to contact support.",
        name = course.name,
        duration = course.duration,
        price = course.price,
        instructor = course.instructor,
        format = course.format,
        schedule = course.schedule,
        prerequisites = course.prerequisites,
        support = course.support,
        description = course.description,
    )
}

pub fn greeting_reply(course: &CourseInfo) -> String {
    format!(
        "Hello! 👋 Welcome to our {name} information assistant!\n\
         \n\
         I'm here to help you learn about the course. Here's what I can help you with:\n\
         \n\
         📚 **Course Overview:** {description}\n\
         ⏰ **Duration:** {duration}\n\
         💰 **Price:** {price}\n\
         📅 **Schedule:** {schedule}\n\
         \n\
         Feel free to ask me about:\n\
         - Course details and curriculum\n\
         - Pricing and payment options\n\
         - Schedule and format\n\
         - Benefits and what you'll learn\n\
         - How to register\n\
         - Any other questions!\n\
         \n\
         What would you like to know about the course?",
        name = course.name,
        description = course.description,
        duration = course.duration,
        price = course.price,
        schedule = course.schedule,
    )
}

/// Welcome sent by the explicit start command; replaces any prior history.
pub fn start_welcome(course: &CourseInfo) -> String {
    let benefits = course
        .benefits
        .iter()
        .take(START_BENEFIT_COUNT)
        .map(|benefit| format!("✅ {benefit}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "🎉 Welcome to {name}!\n\
         \n\
         I'm your personal course assistant, here to help you learn everything about the program.\n\
         \n\
         **Quick Course Overview:**\n\
         📚 **Course:** {name}\n\
         ⏰ **Duration:** {duration}\n\
         💰 **Investment:** {price}\n\
         👨‍💻 **Instructor:** {instructor}\n\
         📱 **Format:** {format}\n\
         \n\
         **What you'll get:**\n\
         {benefits}\n\
         \n\
         Type 'info' for detailed course information, 'faq' for common questions, or 'register' to secure your spot!\n\
         \n\
         What would you like to know? 🤔",
        name = course.name,
        duration = course.duration,
        price = course.price,
        instructor = course.instructor,
        format = course.format,
    )
}

/// Fallback used when the router runs without a completion service.
pub fn canned_fallback(message: &str) -> String {
    format!(
        "I understand you're asking about: \"{message}\"\n\
         \n\
         I have prepared answers for common questions like:\n\
         - Course duration and schedule\n\
         - Pricing information\n\
         - Registration process\n\
         - Course benefits\n\
         - Instructor details\n\
         \n\
         Try asking: \"What is the course duration?\" or \"How much does it cost?\" or \"How do I register?\""
    )
}

pub fn is_greeting(message: &str) -> bool {
    let lowered = message.to_lowercase();
    GREETING_TOKENS.iter().any(|token| lowered.contains(token))
}

#[cfg(test)]
mod tests {
    use coursebot_core::catalog::CourseInfo;

    use super::{canned_fallback, is_greeting, start_welcome, system_prompt};

    #[test]
    fn system_prompt_embeds_every_course_field() {
        let course = CourseInfo::default();
        let prompt = system_prompt(&course);

        for field in [
            &course.name,
            &course.duration,
            &course.price,
            &course.instructor,
            &course.format,
            &course.schedule,
            &course.prerequisites,
            &course.support,
            &course.description,
        ] {
            assert!(prompt.contains(field.as_str()), "prompt is missing `{field}`");
        }
        for benefit in &course.benefits {
            assert!(prompt.contains(&format!("- {benefit}")));
        }
    }

    #[test]
    fn start_welcome_lists_first_five_benefits() {
        let course = CourseInfo::default();
        let welcome = start_welcome(&course);

        assert!(welcome.contains("**Investment:** $299"));
        assert!(welcome.contains("✅ Access to lifetime course materials"));
        assert!(!welcome.contains("1-on-1 mentorship sessions"));
    }

    #[test]
    fn greeting_detection_is_substring_based() {
        assert!(is_greeting("Hello there"));
        assert!(is_greeting("I need HELP"));
        assert!(is_greeting("this matters"), "`hi` inside a word still counts");
        assert!(!is_greeting("price?"));
    }

    #[test]
    fn canned_fallback_echoes_question() {
        assert!(canned_fallback("Do you teach Go?").contains("\"Do you teach Go?\""));
    }
}
