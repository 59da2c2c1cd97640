//! Prompt text and the templated mock responder.

pub fn system_prompt(name: &str) -> String {
    format!(
        "You are {name}'s personal chatbot assistant. Your role is to help visitors learn about \
         {name} by answering questions based on the information provided in the portfolio. \
         Be polite, friendly, and slightly humorous when appropriate. Only provide information \
         that you can find in the context provided. If you don't have specific information \
         about something, politely say 'I don't have that information about {name}, but you \
         can ask me about skills, projects, experience, or other details I do know about!' \
         Never make up or generate random information about {name}."
    )
}

pub fn user_prompt(name: &str, question: &str, context: &str) -> String {
    if context.is_empty() {
        format!(
            "Question: {question}\n\n\
             Please provide a helpful response. If you don't have specific information about \
             this, please say so politely."
        )
    } else {
        format!(
            "Based on the following information about {name}, please answer the question.\n\n\
             {name}'s Information:\n{context}\n\n\
             Question: {question}\n\n\
             Please provide a helpful and accurate response based on the information above. \
             If the information doesn't contain details about the specific question, please \
             say so politely."
        )
    }
}

/// Deterministic answer used by the mock provider and as the fallback.
/// Contains the context verbatim when there is one.
pub fn mock_response(name: &str, question: &str, context: &str) -> String {
    if context.is_empty() {
        format!(
            "Hi! I'm {name}'s personal chatbot assistant! 🤖\n\n\
             Question: {question}\n\n\
             I'm currently running in mock mode. I'd love to help you learn about {name}, but I \
             need to be connected to a real language model first. Once that's set up, I'll be \
             able to answer all your questions about {name}'s skills, projects, and experience! 😄"
        )
    } else {
        format!(
            "Hey there! 👋 I'm {name}'s personal chatbot assistant. Based on the information I \
             have about {name}:\n\n\
             {context}\n\n\
             Question: {question}\n\n\
             I'm currently running in mock mode. With a language model connected I'd give you a \
             much more detailed answer. Ask me about {name}'s skills, projects, experience, and \
             more! 😊"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_response_embeds_context_and_question() {
        let text = mock_response("Satvik", "Where does he work?", "He works at DRDO.");
        assert!(text.contains("He works at DRDO."));
        assert!(text.contains("Where does he work?"));
        assert!(text.contains("Satvik"));
    }

    #[test]
    fn test_mock_response_without_context() {
        let text = mock_response("Ada", "Favourite colour?", "");
        assert!(text.contains("Favourite colour?"));
        assert!(text.contains("mock mode"));
        assert!(!text.contains("Based on the information"));
    }

    #[test]
    fn test_user_prompt_variants() {
        let with = user_prompt("Ada", "q?", "ctx");
        assert!(with.contains("Ada's Information:\nctx"));
        let without = user_prompt("Ada", "q?", "");
        assert!(without.starts_with("Question: q?"));
    }

    #[test]
    fn test_system_prompt_uses_name() {
        let prompt = system_prompt("Ada");
        assert!(prompt.starts_with("You are Ada's personal chatbot assistant."));
        assert!(!prompt.contains("Satvik"));
    }
}
