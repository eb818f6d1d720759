/*!
Test harness for viewer sessions.

Wraps a `MockTransport` with logging setup and expectations on the
commands a session is supposed to send.
*/

use crate::mock_transport::{MockTransport, TransportEnds};
use bpdash_core::Command;
use anyhow::Result;

pub struct TestHarness {
    pub transport: MockTransport,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    host: String,
    service: String,
    expected_count: usize,
}

impl TestHarness {
    pub fn new() -> (Self, TransportEnds) {
        env_logger::try_init().ok();
        let (transport, ends) = MockTransport::new();
        let harness = Self {
            transport,
            expectations: Vec::new(),
        };
        (harness, ends)
    }

    /// Expects exactly `count` commands addressed to `host!service`.
    pub fn expect_commands(&mut self, host: &str, service: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            host: host.to_string(),
            service: service.to_string(),
            expected_count: count,
        });
        self
    }

    pub fn commands_for(&self, host: &str, service: &str) -> Vec<Command> {
        self.transport
            .sent_commands()
            .into_iter()
            .filter(|c| c.host == host && c.service == service)
            .collect()
    }

    pub fn verify_expectations(&self) -> Result<()> {
        log::info!("verifying {} expectations", self.expectations.len());
        for expectation in &self.expectations {
            let actual = self.commands_for(&expectation.host, &expectation.service).len();
            if actual != expectation.expected_count {
                anyhow::bail!(
                    "expectation failed for {}!{}: expected {} commands, got {}",
                    expectation.host,
                    expectation.service,
                    expectation.expected_count,
                    actual
                );
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.transport.clear();
        self.expectations.clear();
    }
}
