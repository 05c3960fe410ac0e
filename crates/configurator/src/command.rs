//! Embedding command channel
//!
//! Inbound `{type, payload}` records are dispatched onto a `Session`; every
//! command yields exactly one acknowledgement.

use serde_json::json;

use shared::{Ack, Command};

use crate::session::Session;

/// Execute a single command on the session.
pub async fn execute_command(session: &mut Session, cmd: Command) -> Ack {
    tracing::debug!("Command {}", cmd.type_name());
    match cmd {
        Command::ChangeColor { color } => match session.apply_color(&color) {
            Ok(painted) => Ack::success(
                "COLOR_CHANGED",
                json!({ "color": session.state().paint_color, "meshes": painted }),
            ),
            Err(e) => Ack::error(e.to_string()),
        },

        Command::ResetColor => match session.reset_color() {
            Ok(_) => Ack::success("COLOR_RESET", json!({ "color": session.state().paint_color })),
            Err(e) => Ack::error(e.to_string()),
        },

        Command::ReplacePart { category, part_id } => {
            match session.replace_part(&category, &part_id).await {
                Ok(_) => Ack::success(
                    "PART_REPLACED",
                    json!({ "category": category, "partId": part_id }),
                ),
                Err(e) => {
                    tracing::error!("Replace {} with {} failed: {}", category, part_id, e);
                    Ack::error(e.to_string())
                }
            }
        }

        Command::ResetPart { category } => match session.reset_part(&category) {
            Ok(()) => Ack::success("PART_RESET", json!({ "category": category })),
            Err(e) => Ack::error(e.to_string()),
        },

        Command::ChangeHdri { hdri } => match session.set_environment(&hdri) {
            Some(preset) => Ack::success(
                "HDRI_CHANGED",
                json!({ "hdri": preset.id, "file": preset.file, "ground": preset.ground }),
            ),
            None => Ack::error(format!("Unknown environment preset '{hdri}'")),
        },

        Command::UpdateModel { part, value } => {
            session.update_selection(&part, &value);
            Ack::success("MODEL_UPDATED", json!({ "part": part, "value": value }))
        }

        Command::LoadConfiguration(parts) => {
            for (part, value) in &parts {
                session.update_selection(part, value);
            }
            Ack::success(
                "CONFIGURATION_LOADED",
                json!({ "selectedParts": session.state().selected_parts }),
            )
        }

        Command::RequestCurrentState => match serde_json::to_value(session.summary()) {
            Ok(summary) => Ack::success("CURRENT_STATE", summary),
            Err(e) => Ack::error(e.to_string()),
        },
    }
}

/// Parse and execute a single JSON command. Malformed or unknown records
/// produce an `ERROR` acknowledgement.
pub async fn execute_json(session: &mut Session, json: &str) -> Ack {
    match serde_json::from_str::<Command>(json) {
        Ok(cmd) => execute_command(session, cmd).await,
        Err(e) => {
            tracing::warn!("Rejected command: {}", e);
            Ack::error(format!("Invalid command JSON: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use shared::AckStatus;

    #[tokio::test]
    async fn test_change_color_ack() {
        let (mut session, _) = fixtures::loaded_session().await;
        let ack = execute_json(
            &mut session,
            r##"{"type":"CHANGE_COLOR","payload":{"color":"#1a2b3c"}}"##,
        )
        .await;
        assert_eq!(ack.kind, "COLOR_CHANGED");
        assert_eq!(ack.status, AckStatus::Success);
        assert_eq!(ack.data.unwrap()["color"], "#1a2b3c");
    }

    #[tokio::test]
    async fn test_invalid_color_is_error_ack() {
        let (mut session, _) = fixtures::loaded_session().await;
        let ack = execute_command(
            &mut session,
            Command::ChangeColor {
                color: "red".into(),
            },
        )
        .await;
        assert_eq!(ack.kind, "ERROR");
        assert!(ack.message.is_some());
        assert_eq!(session.state().paint_color, shared::DEFAULT_PAINT_COLOR);
    }

    #[tokio::test]
    async fn test_replace_and_reset_part_acks() {
        let (mut session, _) = fixtures::loaded_session().await;
        let ack = execute_json(
            &mut session,
            r#"{"type":"REPLACE_PART","payload":{"category":"Wheels & Tires","partId":"Wheel_2"}}"#,
        )
        .await;
        assert!(ack.is_success(), "{ack:?}");
        assert_eq!(ack.kind, "PART_REPLACED");

        let ack = execute_json(
            &mut session,
            r#"{"type":"RESET_PART","payload":{"category":"Wheels & Tires"}}"#,
        )
        .await;
        assert_eq!(ack.kind, "PART_RESET");
        assert!(session.state().replaced_nodes().is_empty());
    }

    #[tokio::test]
    async fn test_missing_part_is_error_ack() {
        let (mut session, _) = fixtures::loaded_session().await;
        let before = session.content_hash();
        let ack = execute_command(
            &mut session,
            Command::ReplacePart {
                category: "Wheels & Tires".into(),
                part_id: "Wheel_404".into(),
            },
        )
        .await;
        assert_eq!(ack.status, AckStatus::Error);
        assert_eq!(session.content_hash(), before);
    }

    #[tokio::test]
    async fn test_hdri_and_selection_commands() {
        let (mut session, _) = fixtures::loaded_session().await;
        let ack = execute_json(&mut session, r#"{"type":"CHANGE_HDRI","payload":{"hdri":"snow"}}"#).await;
        assert_eq!(ack.kind, "HDRI_CHANGED");
        let ack = execute_json(&mut session, r#"{"type":"CHANGE_HDRI","payload":{"hdri":"moon"}}"#).await;
        assert_eq!(ack.kind, "ERROR");

        let ack = execute_json(
            &mut session,
            r#"{"type":"UPDATE_MODEL","payload":{"part":"wheelModel","value":"Wheel_3"}}"#,
        )
        .await;
        assert_eq!(ack.kind, "MODEL_UPDATED");

        let ack = execute_json(
            &mut session,
            r#"{"type":"LOAD_CONFIGURATION","payload":{"tyreModel":"Tire_AT"}}"#,
        )
        .await;
        assert_eq!(ack.kind, "CONFIGURATION_LOADED");
        let parts = &ack.data.unwrap()["selectedParts"];
        assert_eq!(parts["wheelModel"], "Wheel_3");
        assert_eq!(parts["tyreModel"], "Tire_AT");
    }

    #[tokio::test]
    async fn test_current_state_reports_hash() {
        let (mut session, _) = fixtures::loaded_session().await;
        let ack = execute_json(&mut session, r#"{"type":"REQUEST_CURRENT_STATE"}"#).await;
        assert_eq!(ack.kind, "CURRENT_STATE");
        let data = ack.data.unwrap();
        assert_eq!(data["contentHash"], session.content_hash());
        assert_eq!(data["selectedEnvironment"], "neutral");
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_commands() {
        let (mut session, _) = fixtures::loaded_session().await;
        let ack = execute_json(&mut session, r#"{"type":"UPDATE_CAMERA","payload":{}}"#).await;
        assert_eq!(ack.kind, "ERROR");
        let ack = execute_json(&mut session, "not json").await;
        assert_eq!(ack.status, AckStatus::Error);
    }
}
