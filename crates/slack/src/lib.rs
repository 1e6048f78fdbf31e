//! Slack Integration - Socket Mode bot interface
//!
//! This crate provides the Slack interface for nudge:
//! - **Chat Client** (`client`) - Outbound `chat.postMessage` sends with explicit acks
//! - **Events** (`events`) - Inbound event model and the dispatcher
//! - **Handlers** (`handlers`) - DM reminder and mention greeting reactions
//! - **Socket Mode** (`socket`) - WebSocket connection to Slack (no public URL needed)
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Enable Socket Mode and subscribe to `message.im` and `app_mention` events
//! 3. Set env vars: `NUDGE_SLACK_APP_TOKEN`, `NUDGE_SLACK_BOT_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! Slack Events → SocketModeRunner → EventDispatcher → Handlers
//!                                                         ↓
//!                                      ChatClient ← fixed reply text
//! ```
//!
//! # Key Types
//!
//! - `SocketModeRunner` - WebSocket event loop with reconnection logic
//! - `EventDispatcher` - Routes events to appropriate handlers
//! - `ChatClient` - Outbound send capability shared with the announcer

pub mod client;
pub mod events;
pub mod handlers;
pub mod socket;
