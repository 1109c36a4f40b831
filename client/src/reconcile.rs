use gmp_common::{error::GmpError, transport::ByteStream};

use crate::client::GmpClient;

/// Filter expression selecting targets named exactly `name`.
///
/// The filter grammar has no escape for a double quote inside a quoted
/// value, so such names are rejected.
pub fn name_filter(name: &str) -> Result<String, GmpError> {
    if name.contains('"') {
        return Err(GmpError::Protocol(format!(
            "target name {name:?} contains a double quote"
        )));
    }
    Ok(format!("name=\"{name}\""))
}

/// Returns the id of a target named `name` that scans exactly `hosts` on
/// `port_list_id`, creating one when none exists.
///
/// There is no locking: two callers racing on the same name may both create
/// a target.
pub fn find_or_create_target<S: ByteStream>(
    client: &mut GmpClient<S>,
    name: &str,
    hosts: &[String],
    port_list_id: &str,
) -> Result<String, GmpError> {
    let candidates = client.get_targets(&name_filter(name)?)?;
    for candidate in candidates.iter() {
        let target = candidate?;
        if target.is_equivalent(hosts, port_list_id) {
            tracing::info!("Reusing target {} ({})", target.name, target.id);
            return Ok(target.id);
        }
        tracing::debug!(
            "Target {} does not match (hosts {:?}, port list {})",
            target.id,
            target.hosts,
            target.port_list_id
        );
    }

    let created = client.create_target(name, hosts, port_list_id)?;
    Ok(created.id)
}
