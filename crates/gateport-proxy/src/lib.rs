//! External proxy control planes for gateport
//!
//! Two independent control planes give a workload its public face: a Kong
//! reverse proxy for HTTP (per-object admin API) and an frp tunnel server
//! for TCP/SSH (whole-document config protocol). Both are driven through
//! small traits so the orchestrator can be tested without either server.
//! The bounded pool of public tunnel ports lives here too.

pub mod error;
pub mod pool;
pub mod reverse;
pub mod tunnel;

pub use error::ProxyError;
pub use pool::{PoolExhausted, PortPool};
pub use reverse::{KongAdmin, ReverseProxy};
pub use tunnel::{FrpAdmin, TcpProxySpec, TunnelProxy};
