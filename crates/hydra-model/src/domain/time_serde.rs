//! Optional `SystemTime` encoded as milliseconds since the unix epoch.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match time {
        Some(time) => {
            let since_epoch = time
                .duration_since(UNIX_EPOCH)
                .map_err(serde::ser::Error::custom)?;
            Some(since_epoch.as_millis() as u64).serialize(serializer)
        }
        None => None::<u64>.serialize(serializer),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<u64>::deserialize(deserializer)?;
    Ok(millis.map(|ms| UNIX_EPOCH + Duration::from_millis(ms)))
}
