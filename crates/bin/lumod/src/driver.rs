//! Line-based driver for the virtual hub.
//!
//! Each line read from the input plays the part of the physical world:
//!
//! ```text
//! binary_sensor.hall_motion on      # set a state
//! light.bedside brightness=120      # set an attribute
//! list                              # log every entity
//! ```

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use lumo_adapter_virtual::VirtualHub;
use lumo_domain::entity::{AttributeValue, EntityState};
use lumo_domain::error::ValidationError;
use lumo_domain::id::EntityId;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetState(EntityId, EntityState),
    SetAttribute(EntityId, String, AttributeValue),
    List,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("expected `<entity_id> <state>` or `<entity_id> <key>=<value>`")]
    Usage,
    #[error(transparent)]
    InvalidEntityId(#[from] ValidationError),
}

/// Parse a line; blank lines and `#` comments yield `None`.
///
/// # Errors
///
/// Returns [`DriverError`] for lines that are neither a command nor a
/// comment.
pub fn parse_line(line: &str) -> Result<Option<Command>, DriverError> {
    let line = line.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line == "list" {
        return Ok(Some(Command::List));
    }

    let mut parts = line.split_whitespace();
    let (Some(entity_id), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(DriverError::Usage);
    };
    let entity_id = EntityId::parse(entity_id)?;

    let command = match value.split_once('=') {
        Some((key, raw)) if !key.is_empty() => {
            Command::SetAttribute(entity_id, key.to_string(), parse_value(raw))
        }
        Some(_) => return Err(DriverError::Usage),
        None => Command::SetState(entity_id, EntityState::from(value)),
    };
    Ok(Some(command))
}

fn parse_value(raw: &str) -> AttributeValue {
    if let Ok(v) = raw.parse::<i64>() {
        AttributeValue::Int(v)
    } else if let Ok(v) = raw.parse::<f64>() {
        AttributeValue::Float(v)
    } else if let Ok(v) = raw.parse::<bool>() {
        AttributeValue::Bool(v)
    } else {
        AttributeValue::String(raw.to_string())
    }
}

/// Apply lines from `input` to `hub` until end of input.
///
/// # Errors
///
/// Returns an I/O error if reading the input fails. Bad lines are logged
/// and skipped.
pub async fn run<R>(hub: Arc<VirtualHub>, input: R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(Some(command)) => apply(&hub, command),
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, %line, "ignoring input line"),
        }
    }
    tracing::debug!("driver input closed");
    Ok(())
}

fn apply(hub: &VirtualHub, command: Command) {
    let result = match command {
        Command::SetState(entity_id, state) => hub.set_state(&entity_id, state),
        Command::SetAttribute(entity_id, key, value) => hub.set_attribute(&entity_id, key, value),
        Command::List => {
            for entity_id in hub.entity_ids() {
                if let Some(snapshot) = hub.snapshot(&entity_id) {
                    tracing::info!(
                        %entity_id,
                        state = %snapshot.state,
                        brightness = snapshot.brightness(),
                        "entity"
                    );
                }
            }
            Ok(())
        }
    };
    if let Err(err) = result {
        tracing::warn!(%err, "driver command failed");
    }
}
