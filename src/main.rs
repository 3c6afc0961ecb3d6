//! prometheus alertmanager receiver that forwards alert groups into dingtalk group chats
//!
//! Features:
//! - the dingtalk robot webhook and who to mention are chosen per receiver via url arguments
//! - alert groups are described according to their `alert_type` label
//! - prometheus metrics about received and failed alerts

use anyhow::{Context, Result};

use crate::dingtalk::{DispatchSettings, Dispatcher};

mod alert;
mod alert_renderer;
mod alertmanager_webhook_receiver;
mod dingtalk;
mod log;
mod rendered_alert;
mod settings;
mod telemetry_endpoint;
#[cfg(test)]
mod test_util;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	log::setup_logging().context("could not setup logging")?;

	let dispatcher =
		Dispatcher::new(DispatchSettings::global()).context("failed to construct http client")?;

	tokio::try_join!(
		alertmanager_webhook_receiver::run_alert_receiver(dispatcher),
		telemetry_endpoint::run_telemetry_endpoint(),
	)?;

	Ok(())
}
