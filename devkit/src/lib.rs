/*!
# bpdash DevKit - test doubles and builders

Helpers for testing viewers and the hub without a network:
- `MockTransport` : in-memory channel ends recording outbound frames
- `LoopbackHub` : authoritative store + fan-out for several mock viewers
- `TimelineBuilder` / `DeltaBuilder` : fixtures matching the wire formats
- `TestHarness` : logging init and expectations on sent commands
*/

pub mod builders;
pub mod mock_transport;
pub mod test_utils;

pub use builders::{DeltaBuilder, TimelineBuilder};
pub use mock_transport::{LoopbackHub, MockTransport, TransportEnds};
pub use test_utils::TestHarness;
