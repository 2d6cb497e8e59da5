use crate::link::{LinkError, SignalReceiver, SignalSender};
use signal_types::ServerInfo;

/// Which side of the connection we are. The four-message exchange itself is
/// symmetric (§6); this only matters to a caller deciding whether an
/// observed peer address is even meaningful (a dialer already knows the
/// address it connected to).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    Dialer,
    Accepter,
}

#[derive(Debug, Clone)]
pub struct HandshakeOutcome {
    pub peer_info: ServerInfo,
    /// Set only when our own `ServerInfo.ip` was empty and the peer handed
    /// back a non-empty one for us to adopt.
    pub learned_local_ip: Option<String>,
}

/// Runs the info-switch handshake used on `/station/relay/join` and
/// `/recorder/station/join` (§6): both sides send their own `ServerInfo`,
/// then each fills in the other's IP from the observed socket address if it
/// was left blank, and echoes it back.
pub async fn run_handshake(
    sender: &mut dyn SignalSender,
    receiver: &mut dyn SignalReceiver,
    local_info: &ServerInfo,
    _role: HandshakeRole,
) -> Result<HandshakeOutcome, LinkError> {
    sender.send_json(&serde_json::to_value(local_info)?).await?;

    let value = receiver.recv_json().await?.ok_or(LinkError::Closed)?;
    let mut peer_info: ServerInfo = serde_json::from_value(value)?;

    if peer_info.ip.is_empty() {
        if let Some(observed) = receiver.peer_addr() {
            peer_info.ip = host_only(&observed);
        }
    }
    sender.send_json(&serde_json::to_value(&peer_info)?).await?;

    let value = receiver.recv_json().await?.ok_or(LinkError::Closed)?;
    let echoed_local: ServerInfo = serde_json::from_value(value)?;
    let learned_local_ip = if local_info.ip.is_empty() && !echoed_local.ip.is_empty() {
        Some(echoed_local.ip)
    } else {
        None
    };

    Ok(HandshakeOutcome { peer_info, learned_local_ip })
}

fn host_only(addr: &str) -> String {
    addr.rsplit_once(':').map(|(host, _)| host.to_string()).unwrap_or_else(|| addr.to_string())
}
