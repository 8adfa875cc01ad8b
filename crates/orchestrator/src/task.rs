//! The two-stage generation protocol for one affirmation.

use innervoice_core::GenerationRecord;
use kimi_client::{ChatMessage, ChatModel};
use tracing::{error, warn};

use crate::prompts::NarrationPrompts;
use crate::response;

/// Result of one task, keyed to its dispatch index. `record` is `None` for
/// every failure mode.
#[derive(Debug)]
pub struct TaskOutcome {
    pub index: usize,
    pub record: Option<GenerationRecord>,
}

/// Run the draft/critique protocol for one affirmation.
///
/// All failures, malformed replies and transport errors alike, are
/// contained here; a task can never abort its siblings or the batch.
pub async fn run_task<C: ChatModel>(client: &C, index: usize, affirmation: &str) -> TaskOutcome {
    let record = match two_stage(client, affirmation).await {
        Ok(record) => record,
        Err(e) => {
            error!(index, affirmation = %affirmation, error = %e, "Task failed");
            None
        }
    };

    TaskOutcome { index, record }
}

async fn two_stage<C: ChatModel>(
    client: &C,
    affirmation: &str,
) -> crate::Result<Option<GenerationRecord>> {
    let mut messages = vec![ChatMessage::user(NarrationPrompts::draft(affirmation))];
    let reply = client.send(&messages).await?;

    let draft = match parse_narration(&reply) {
        Some(text) => text,
        None => {
            warn!(affirmation = %affirmation, "Draft stage yielded no narration, skipping");
            return Ok(None);
        }
    };

    // The critique prompt embeds the draft, so the model revises its own
    // output; the draft reply itself is not replayed as a turn.
    messages.push(ChatMessage::user(NarrationPrompts::critique(&draft)));
    let reply = client.send(&messages).await?;

    let refined = match parse_narration(&reply) {
        Some(text) => text,
        None => {
            warn!(affirmation = %affirmation, "Critique stage yielded no narration, skipping");
            return Ok(None);
        }
    };

    Ok(Some(GenerationRecord::new(
        affirmation,
        &refined,
        client.model_name(),
    )))
}

fn parse_narration(reply: &str) -> Option<String> {
    let value = response::extract_json(reply)?;
    response::narration_text(&value).map(str::to_owned)
}
