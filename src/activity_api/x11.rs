use anyhow::{anyhow, Result};
use tracing::instrument;
use xcb::{
    screensaver::{QueryInfo, QueryInfoReply},
    x::{Drawable, Window},
    Connection,
};

use super::ActivitySource;

/// Idle time from the X screensaver extension.
pub struct LinuxActivitySource {
    connection: Connection,
    preferred_screen: i32,
}

impl LinuxActivitySource {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) =
            Connection::connect_with_extensions(None, &[xcb::Extension::ScreenSaver], &[])?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }

    fn root(&self) -> Result<Window> {
        // Only one x11 screen is supported.
        self.connection
            .get_setup()
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .map(|screen| screen.root())
            .ok_or_else(|| anyhow!("Screen {} doesn't exist", self.preferred_screen))
    }
}

impl ActivitySource for LinuxActivitySource {
    #[instrument(skip(self))]
    fn get_idle_time(&mut self) -> Result<u32> {
        let root = self.root()?;
        let idle = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(root),
        });
        let reply: QueryInfoReply = self.connection.wait_for_reply(idle)?;
        Ok(reply.ms_since_user_input())
    }
}
