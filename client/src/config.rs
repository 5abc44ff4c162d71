/// Runtime configuration for a chat session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity of the presentation-intent command channel.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { command_buffer: 64 }
    }
}
