//! Platform queries for how long the user hasn't touched any input device.
//! [GenericActivitySource] picks the implementation compiled in through the `x11` or `win`
//! feature.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;

/// Contract the windows and linux input sources implement.
#[cfg_attr(test, mockall::automock)]
pub trait ActivitySource {
    /// Milliseconds since the last keyboard, pointer, scroll or touch input.
    fn get_idle_time(&mut self) -> Result<u32>;
}

/// Cross platform [ActivitySource].
pub struct GenericActivitySource {
    inner: Box<dyn ActivitySource>,
}

impl GenericActivitySource {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsActivitySource;
                Ok(Self {
                    inner: Box::new(WindowsActivitySource::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::LinuxActivitySource;
                Ok(Self {
                    inner: Box::new(LinuxActivitySource::new()?),
                })
            }
            else {
                Err(anyhow::anyhow!(
                    "No activity source was compiled in, enable the x11 or win feature"
                ))
            }
        }
    }
}

impl ActivitySource for GenericActivitySource {
    fn get_idle_time(&mut self) -> Result<u32> {
        self.inner.get_idle_time()
    }
}
