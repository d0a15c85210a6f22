//! Persona: the system instruction sent with every generation request.

use parley_config::PersonaConfig;

#[derive(Debug, Clone)]
pub struct Persona {
    system_prompt: String,
    empty_message_reply: String,
}

impl Persona {
    pub fn new(system_prompt: impl Into<String>, empty_message_reply: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            empty_message_reply: empty_message_reply.into(),
        }
    }

    pub fn from_config(config: &PersonaConfig) -> Self {
        Self::new(&config.system_prompt, &config.empty_message_reply)
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Reply used when the user sent nothing but whitespace.
    pub fn empty_message_reply(&self) -> &str {
        &self.empty_message_reply
    }

    /// The base prompt followed by a block naming the user, so the model
    /// addresses them directly. A blank name yields the base prompt alone.
    pub fn instruction_for(&self, user_name: &str) -> String {
        let name = user_name.trim();
        if name.is_empty() {
            return self.system_prompt.clone();
        }

        format!(
            "{}\n\n---\nUSER: {name}\n---\nAddress the user as \"{name}\" or simply \"you\".",
            self.system_prompt
        )
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::from_config(&PersonaConfig::default())
    }
}
