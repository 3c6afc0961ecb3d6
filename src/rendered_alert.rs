//! The dingtalk robot message a rendered alert group is wrapped in before posting.

use serde::Serialize;

use crate::alert_renderer::RenderedAlert;

#[derive(Debug, Clone, Serialize)]
/// markdown robot message
pub struct DingTalkMessage {
	msgtype: &'static str,
	at: At,
	markdown: Markdown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
/// who gets mentioned in the group chat
pub struct At {
	pub at_mobiles: Vec<String>,
	pub is_at_all: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Markdown {
	pub title: String,
	pub text: String,
}

impl DingTalkMessage {
	/// Constructs the markdown message for a rendered alert group
	///
	/// # Arguments
	///
	/// * `alert` - the rendered alert group
	///
	/// * `at` - phone numbers to mention and whether to mention everyone
	pub fn new(alert: RenderedAlert, at: At) -> Self {
		let RenderedAlert { title, text, .. } = alert;

		Self {
			msgtype: "markdown",
			at,
			markdown: Markdown { title, text },
		}
	}
}
