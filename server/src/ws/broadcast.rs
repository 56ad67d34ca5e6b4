use super::protocol::ServerEvent;
use super::{ConnectionId, Connections};

/// Broadcast an event to every open connection except `skip`.
/// Returns how many connections accepted the frame.
pub fn broadcast_except(
    connections: &Connections,
    skip: Option<ConnectionId>,
    event: &ServerEvent,
) -> usize {
    let msg = match event.to_message() {
        Ok(msg) => msg,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode broadcast event");
            return 0;
        }
    };

    connections
        .snapshot()
        .into_iter()
        .filter(|(id, _)| Some(*id) != skip)
        .filter(|(_, sender)| sender.send(msg.clone()).is_ok())
        .count()
}

/// Send an event to one connection.
/// Returns false if the connection is unknown or its writer is gone.
pub fn send_to_connection(
    connections: &Connections,
    connection_id: ConnectionId,
    event: &ServerEvent,
) -> bool {
    let Some(sender) = connections.get(connection_id) else {
        return false;
    };
    match event.to_message() {
        Ok(msg) => sender.send(msg).is_ok(),
        Err(e) => {
            tracing::error!(
                connection_id = %connection_id,
                error = %e,
                "Failed to encode event"
            );
            false
        }
    }
}
