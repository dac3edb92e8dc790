//! Command line runner for the `sepflux` library.

#[cfg(not(feature = "for-testing"))]
#[quit::main]
fn main() {
    #[cfg(feature = "cli")]
    sepflux::cli::run::run();
}

#[cfg(feature = "for-testing")]
fn main() {
    #[cfg(feature = "cli")]
    {
        eprintln!(
            "Warning: The `for-testing` feature is enabled, so errors will panic instead of exiting\n\
             Tip: Use cargo flag --features=all-non-testing to include all features except `for-testing`"
        );
        sepflux::cli::run::run();
    }
}
