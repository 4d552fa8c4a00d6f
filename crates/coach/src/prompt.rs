//! Prompt construction for both inference paths

use sales_coach_config::prompts::TRANSCRIPT_PLACEHOLDER;
use sales_coach_config::PromptsConfig;
use sales_coach_core::{CallType, ChatMessage};

/// Builds the cloud chat prompt and the short on-device prompt
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    prompts: PromptsConfig,
    history_lines: usize,
}

impl PromptBuilder {
    pub fn new(prompts: PromptsConfig, history_lines: usize) -> Self {
        Self {
            prompts,
            history_lines,
        }
    }

    pub fn history_lines(&self) -> usize {
        self.history_lines
    }

    /// Chat messages for the remote model
    ///
    /// Embeds call-type framing, the most recent history lines, product
    /// keywords present in the chunk, and the chunk itself, then asks for
    /// the two labelled sections and the tag line.
    pub fn cloud_messages(
        &self,
        chunk: &str,
        call_type: CallType,
        history: &[String],
    ) -> Vec<ChatMessage> {
        let framing = self.prompts.framing(call_type);
        let mut prompt = String::new();

        if !framing.framing.is_empty() {
            prompt.push_str(&framing.framing);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!("Call type: {}\n", framing.display_name));

        let skip = history.len().saturating_sub(self.history_lines);
        let recent: Vec<&String> = history
            .iter()
            .skip(skip)
            .filter(|line| !line.trim().is_empty())
            .collect();
        if !recent.is_empty() {
            prompt.push_str("\nRecent conversation:\n");
            for line in recent {
                prompt.push_str(&format!("- {}\n", line.trim()));
            }
        }

        let keywords = self.prompts.matching_keywords(chunk);
        if !keywords.is_empty() {
            prompt.push_str(&format!("\nProduct topics mentioned: {}\n", keywords.join(", ")));
        }

        prompt.push_str(&format!("\nThe customer just said: \"{}\"\n\n", chunk.trim()));
        prompt.push_str(
            "Respond in exactly this format:\n\
             **Analysis:** <one or two sentences on what is happening>\n\
             **Suggestion:** <one specific, actionable tip the rep can use right now>\n\
             TYPE: <objection|product_pitch|closing|retention|general> PRIORITY: <high|medium|low>",
        );

        vec![
            ChatMessage::system(self.prompts.system_prompt.clone()),
            ChatMessage::user(prompt),
        ]
    }

    /// Short prompt for the on-device model
    pub fn local_prompt(&self, chunk: &str, call_type: CallType) -> String {
        let template = self.prompts.framing(call_type).local_template;
        if template.contains(TRANSCRIPT_PLACEHOLDER) {
            template.replace(TRANSCRIPT_PLACEHOLDER, chunk.trim())
        } else {
            format!("{}\nCustomer said: \"{}\"", template.trim_end(), chunk.trim())
        }
    }
}
