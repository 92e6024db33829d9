use crate::chat_history::Message;
use crate::config::Config;
use crate::retrieve_chunks::Hit;

pub fn build_prompt_with_context(cfg: &Config, prompt: &str, hits: &[Hit]) -> (Vec<Message>, String) {
    let context = format_context_from_hits(hits);

    let user_content = format!("User prompt:\n{}\n\nRetrieved documents:\n{}", prompt, context);

    let messages = vec![Message::system(cfg.llm.system_prompt.clone()), Message::user(user_content)];

    (messages, context)
}

/// Number the hits in retrieval order. No hits gives an empty block.
pub fn format_context_from_hits(hits: &[Hit]) -> String {
    let mut context = String::new();
    for hit in hits {
        context.push_str(&format!("# Retrieved document {}: \n{}\n\n", hit.rank, hit.text));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_history::Role;
    use crate::config::tests::SAMPLE;

    fn hit(rank: usize, text: &str) -> Hit {
        Hit { rank, score: 1.0 / rank as f32, text: text.to_string(), source: None, page: None }
    }

    #[test]
    fn context_is_numbered_in_rank_order() {
        let context = format_context_from_hits(&[hit(1, "alpha"), hit(2, "beta")]);
        assert_eq!(context, "# Retrieved document 1: \nalpha\n\n# Retrieved document 2: \nbeta\n\n");
    }

    #[test]
    fn empty_hits_still_build_both_messages() {
        let cfg = Config::from_yaml_str(SAMPLE, "sample").unwrap();
        let (messages, context) = build_prompt_with_context(&cfg, "what?", &[]);
        assert!(context.is_empty());
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are a helpful assistant.");
        assert_eq!(messages[1].content, "User prompt:\nwhat?\n\nRetrieved documents:\n");
    }
}
