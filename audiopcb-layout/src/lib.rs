//! Layout engines for the audio PCB pipeline.
//!
//! Three stages, run in order by the pipeline driver:
//!
//! 1. [`placement`] — constraint-driven component placement (groups, zones,
//!    front-panel rule, stability obstacles, decoupling pull-in)
//! 2. [`routing`] — per-class multi-layer routing with rip-up retry
//! 3. [`zones`] — ground/power pours with thermal relief and optional star
//!    grounding
//!
//! Each stage takes the board exclusively and is deterministic for a given
//! input. Placement failures abort with `PlacementInfeasible`; routing
//! failures are recorded per net and surface as connectivity issues in the
//! validation report.

pub mod grid;
pub mod groups;
pub mod placement;
pub mod routing;
pub mod zones;

pub use placement::{nudge, place};
pub use routing::{resolve_layer, route, route_net, RerouteOptions};
pub use zones::pour;
