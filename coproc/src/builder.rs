use crate::error::Error;
use crate::session::Session;
use crate::transport::Transport;

/// Builds a session that is already brought up
///
/// The load report of the bring-up is kept in `Session::last_load`.
pub struct SessionBuilder<'a, T: Transport> {
    transport: Option<T>,
    program: Option<&'a [u8]>,
}

impl<'a, T: Transport> SessionBuilder<'a, T> {
    pub fn new() -> Self {
        Self {
            transport: None,
            program: None,
        }
    }

    pub fn with_transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_rom(mut self, prog: &'a [u8]) -> Self {
        self.program = Some(prog);
        self
    }

    pub fn build(self) -> Result<Session<T>, Error> {
        let transport = self.transport.ok_or(Error::Incomplete("a transport"))?;
        let program = self.program.ok_or(Error::Incomplete("a program"))?;
        let mut session = Session::new(transport);
        session.bring_up(program)?;
        Ok(session)
    }
}

impl<'a, T: Transport> Default for SessionBuilder<'a, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Phase;
    use crate::sim::SimCoprocessor;

    #[test]
    fn with_transport_and_rom() {
        let session = SessionBuilder::new()
            .with_transport(SimCoprocessor::new())
            .with_rom(&[0x00, 0xE0])
            .build()
            .unwrap();
        assert_eq!(session.phase(), Phase::Paused);
        assert_eq!(session.last_load().map(|r| r.rom_bytes), Some(2));
    }

    #[test]
    fn with_transport_only() {
        let result = SessionBuilder::new()
            .with_transport(SimCoprocessor::new())
            .build();
        assert!(matches!(result, Err(Error::Incomplete("a program"))));
    }

    #[test]
    fn with_rom_only() {
        let result = SessionBuilder::<'_, SimCoprocessor>::new()
            .with_rom(&[])
            .build();
        assert!(matches!(result, Err(Error::Incomplete("a transport"))));
    }

    #[test]
    fn failed_bring_up() {
        let result = SessionBuilder::new()
            .with_transport(SimCoprocessor::new().fail_after(0))
            .with_rom(&[])
            .build();
        assert!(result.map(|_| ()).unwrap_err().is_transport());
    }
}
