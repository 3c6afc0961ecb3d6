//! data structures for deserializing incoming alert groups
use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
/// alert group sent by the prometheus alertmanager webhook
///
/// Missing fields and fields set to `null` take their zero value.
pub struct Data {
	#[serde(deserialize_with = "null_as_default")]
	pub version: String,
	#[serde(deserialize_with = "null_as_default")]
	pub group_key: String,
	#[serde(deserialize_with = "null_as_default")]
	pub status: String,
	#[serde(deserialize_with = "null_as_default")]
	pub receiver: String,
	#[serde(deserialize_with = "null_as_default")]
	pub group_labels: HashMap<String, String>,
	#[serde(deserialize_with = "null_as_default")]
	pub common_labels: HashMap<String, String>,
	#[serde(deserialize_with = "null_as_default")]
	pub common_annotations: HashMap<String, String>,
	#[serde(rename = "externalURL", deserialize_with = "null_as_default")]
	pub external_url: String,
	#[serde(deserialize_with = "null_as_default")]
	pub alerts: Vec<Alert>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Alert {
	#[serde(deserialize_with = "null_as_default")]
	pub status: String,
	#[serde(deserialize_with = "null_as_default")]
	pub labels: HashMap<String, String>,
	#[serde(deserialize_with = "null_as_default")]
	pub annotations: HashMap<String, String>,
	/// kept in the offset alertmanager sent, so rendered times match the sender's clock
	#[serde(deserialize_with = "null_as_default")]
	pub starts_at: DateTime<FixedOffset>,
	#[serde(deserialize_with = "null_as_default")]
	pub ends_at: DateTime<FixedOffset>,
	#[serde(rename = "generatorURL", deserialize_with = "null_as_default")]
	pub generator_url: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de> + Default,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Alert {
	pub fn is_firing(&self) -> bool {
		self.status == "firing"
	}
}

impl Data {
	/// Decodes an alertmanager payload. A body that isn't a valid alert group
	/// yields the empty group, which is later rejected for lacking `alert_type`.
	pub fn from_slice_or_default(body: &[u8]) -> Self {
		match serde_json::from_slice(body) {
			Ok(data) => data,
			Err(err) => {
				tracing::debug!("failed to deserialize alert group, using empty one: {}", err);
				Self::default()
			}
		}
	}
}
