//! Methods every node serves.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use cairn_services::{MethodTable, ServiceError};

/// Add `ping`, `getServerTime` and `getMethods` to `table`.
///
/// Call this after the application methods are registered: `getMethods`
/// lists the public surface as it stands at this point.
pub fn with_builtins(mut table: MethodTable) -> MethodTable {
    table
        .register_fn("ping", |_| async { Ok(Value::String("pong".into())) })
        .register_fn("getServerTime", |_| async { server_time_ms().map(Value::from) });

    let mut names = table.names();
    names.push("getMethods".to_string());
    names.sort();
    table.register_fn("getMethods", move |_| {
        let names = names.clone();
        async move { Ok(json!(names)) }
    });
    table
}

fn server_time_ms() -> Result<u64, ServiceError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(ServiceError::failed)?;
    Ok(elapsed.as_millis() as u64)
}
