use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::domain::ids::SwitchId;
use crate::error::{Error, Result};

/// Match fields used by the controller (spec.md §6): `ethType`, `ipSrc`,
/// `ipDst`. `inPort` is reserved for the learning-switch fallback and is not
/// produced by the Rule Programmer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub eth_type: u16,
    pub ip_src: Option<Ipv4Addr>,
    pub ip_dst: Option<Ipv4Addr>,
    pub in_port: Option<u32>,
    pub eth_dst: Option<String>,
}

const ETH_TYPE_IPV4: u16 = 0x0800;

impl Match {
    pub fn ipv4(src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self { eth_type: ETH_TYPE_IPV4, ip_src: Some(src), ip_dst: Some(dst), in_port: None, eth_dst: None }
    }

    pub fn ipv4_src(src: Ipv4Addr) -> Self {
        Self { eth_type: ETH_TYPE_IPV4, ip_src: Some(src), ip_dst: None, in_port: None, eth_dst: None }
    }

    /// L2 learning-switch match: `in_port` + destination MAC (spec.md §6's
    /// `inPort`, "learning only"). Carries no `ethType` restriction.
    pub fn l2(in_port: u32, eth_dst: impl Into<String>) -> Self {
        Self { eth_type: 0, ip_src: None, ip_dst: None, in_port: Some(in_port), eth_dst: Some(eth_dst.into()) }
    }
}

/// The action list attached to an installed rule. `Drop` is modeled as the
/// empty action list of spec.md §4.6/§6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Output(u32),
    Drop,
}

/// Abstract switch control-plane contract (spec.md §4.6 C7, §6). The
/// dataplane and its wire protocol are out of scope; this is the seam.
pub trait SwitchDriver: Send + Sync {
    fn install_rule(&self, switch: SwitchId, priority: u16, m: Match, action: Action) -> Result<()>;
    fn remove_rule(&self, switch: SwitchId, priority: u16, m: Match) -> Result<()>;
}

/// Default driver: logs every call at `info` and always succeeds. Used by
/// the emulator-less examples and as the controller's default.
#[derive(Debug, Default)]
pub struct LoggingSwitchDriver;

impl SwitchDriver for LoggingSwitchDriver {
    fn install_rule(&self, switch: SwitchId, priority: u16, m: Match, action: Action) -> Result<()> {
        log::info!("install rule on {}: priority={} match={:?} action={:?}", switch, priority, m, action);
        Ok(())
    }

    fn remove_rule(&self, switch: SwitchId, priority: u16, m: Match) -> Result<()> {
        log::info!("remove rule on {}: priority={} match={:?}", switch, priority, m);
        Ok(())
    }
}

/// Records every call it receives; used by tests to verify install/remove
/// symmetry (I3) without a real switch.
#[derive(Debug, Default)]
pub struct MockSwitchDriver {
    installs: Mutex<Vec<(SwitchId, u16, Match, Action)>>,
    removals: Mutex<Vec<(SwitchId, u16, Match)>>,
    fail_next_install: AtomicU64,
}

impl MockSwitchDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next N `install_rule` calls fail with `Error::Driver`, to
    /// exercise the Lifecycle Manager's rollback path (T3).
    pub fn fail_next_installs(&self, n: u64) {
        self.fail_next_install.store(n, Ordering::SeqCst);
    }

    pub fn installed_count(&self) -> usize {
        self.installs.lock().unwrap().len()
    }

    pub fn removed_count(&self) -> usize {
        self.removals.lock().unwrap().len()
    }
}

impl SwitchDriver for MockSwitchDriver {
    fn install_rule(&self, switch: SwitchId, priority: u16, m: Match, action: Action) -> Result<()> {
        let remaining = self.fail_next_install.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_install.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Driver(format!("simulated install failure on {}", switch)));
        }
        self.installs.lock().unwrap().push((switch, priority, m, action));
        Ok(())
    }

    fn remove_rule(&self, switch: SwitchId, priority: u16, m: Match) -> Result<()> {
        self.removals.lock().unwrap().push((switch, priority, m));
        Ok(())
    }
}

/// On-wire request/response for `TcpSwitchDriver`, framed with
/// `tokio_util::codec::LengthDelimitedCodec` and encoded with `bincode` —
/// the same pairing the teacher uses for its actor-to-actor transport
/// (`component_communication::codec::DistSystemCodec`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleCommand {
    Install { switch: SwitchId, priority: u16, m: Match, action: Action },
    Remove { switch: SwitchId, priority: u16, m: Match },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleAck {
    Ok,
    Err(String),
}

pub mod codec {
    use bytes::{Bytes, BytesMut};
    use std::io;
    use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

    use super::{RuleAck, RuleCommand};

    /// Frames `RuleCommand`s for the write half and `RuleAck`s for the read
    /// half of a `TcpSwitchDriver` connection, mirroring the teacher's
    /// `DistSystemCodec` (length-delimited framing + bincode payload).
    pub struct RuleCodec {
        inner: LengthDelimitedCodec,
    }

    impl RuleCodec {
        pub fn new() -> Self {
            Self { inner: LengthDelimitedCodec::new() }
        }
    }

    impl Default for RuleCodec {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Encoder<RuleCommand> for RuleCodec {
        type Error = io::Error;

        fn encode(&mut self, item: RuleCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
            let bytes = bincode::serialize(&item).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            self.inner.encode(Bytes::from(bytes), dst)
        }
    }

    impl Decoder for RuleCodec {
        type Item = RuleAck;
        type Error = io::Error;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            match self.inner.decode(src)? {
                Some(bytes) => {
                    let item = bincode::deserialize(&bytes).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                    Ok(Some(item))
                }
                None => Ok(None),
            }
        }
    }
}

/// A `SwitchDriver` that speaks to a remote switch-agent process over TCP.
/// A dedicated background thread owns a small single-threaded Tokio runtime
/// and the connection; `install_rule`/`remove_rule` send a command and block
/// the calling thread on the matching `RuleAck`, preserving the synchronous
/// contract the Lifecycle Manager's critical section requires (spec.md §5).
pub struct TcpSwitchDriver {
    command_tx: std::sync::mpsc::Sender<(RuleCommand, std::sync::mpsc::Sender<Result<()>>)>,
    _runtime_thread: std::thread::JoinHandle<()>,
}

impl TcpSwitchDriver {
    pub fn connect(addr: std::net::SocketAddr) -> Result<Self> {
        let (command_tx, command_rx) = std::sync::mpsc::channel::<(RuleCommand, std::sync::mpsc::Sender<Result<()>>)>();

        let runtime_thread = std::thread::Builder::new()
            .name("tcp-switch-driver".into())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        log::error!("tcp switch driver runtime failed to start: {}", e);
                        return;
                    }
                };
                runtime.block_on(Self::run(addr, command_rx));
            })
            .expect("failed to spawn tcp switch driver thread");

        Ok(Self { command_tx, _runtime_thread: runtime_thread })
    }

    async fn run(addr: std::net::SocketAddr, command_rx: std::sync::mpsc::Receiver<(RuleCommand, std::sync::mpsc::Sender<Result<()>>)>) {
        use futures_util::{SinkExt, StreamExt};
        use tokio::net::TcpStream;
        use tokio_util::codec::Framed;

        let stream = match TcpStream::connect(addr).await {
            Ok(s) => s,
            Err(e) => {
                log::error!("tcp switch driver could not connect to {}: {}", addr, e);
                return;
            }
        };
        let mut framed = Framed::new(stream, codec::RuleCodec::new());

        while let Ok((command, reply_tx)) = command_rx.recv() {
            let result = async {
                framed.send(command).await.map_err(|e| Error::Driver(e.to_string()))?;
                match framed.next().await {
                    Some(Ok(RuleAck::Ok)) => Ok(()),
                    Some(Ok(RuleAck::Err(msg))) => Err(Error::Driver(msg)),
                    Some(Err(e)) => Err(Error::Driver(e.to_string())),
                    None => Err(Error::Driver("connection closed by switch agent".into())),
                }
            }
            .await;
            let _ = reply_tx.send(result);
        }
    }

    fn dispatch(&self, command: RuleCommand) -> Result<()> {
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        self.command_tx
            .send((command, reply_tx))
            .map_err(|_| Error::Driver("tcp switch driver thread is gone".into()))?;
        reply_rx.recv().map_err(|_| Error::Driver("tcp switch driver thread dropped the reply channel".into()))?
    }
}

impl SwitchDriver for TcpSwitchDriver {
    fn install_rule(&self, switch: SwitchId, priority: u16, m: Match, action: Action) -> Result<()> {
        self.dispatch(RuleCommand::Install { switch, priority, m, action })
    }

    fn remove_rule(&self, switch: SwitchId, priority: u16, m: Match) -> Result<()> {
        self.dispatch(RuleCommand::Remove { switch, priority, m })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_driver_records_calls() {
        let driver = MockSwitchDriver::new();
        driver.install_rule(SwitchId(1), 10, Match::ipv4("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap()), Action::Output(1)).unwrap();
        assert_eq!(driver.installed_count(), 1);
        driver.remove_rule(SwitchId(1), 10, Match::ipv4("10.0.0.1".parse().unwrap(), "10.0.0.2".parse().unwrap())).unwrap();
        assert_eq!(driver.removed_count(), 1);
    }

    #[test]
    fn mock_driver_can_simulate_failure() {
        let driver = MockSwitchDriver::new();
        driver.fail_next_installs(1);
        let err = driver.install_rule(SwitchId(1), 10, Match::ipv4_src("10.0.0.1".parse().unwrap()), Action::Drop).unwrap_err();
        assert!(matches!(err, Error::Driver(_)));
        assert_eq!(driver.installed_count(), 0);
    }
}
