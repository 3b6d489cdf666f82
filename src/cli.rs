mod connectors;
mod probe;

use {
    crate::{logger::Logger, monitor::MonitorType},
    ::log::Level,
    clap::{Args, Parser, Subcommand, ValueEnum},
};

/// Presents video frames directly on a display through KMS.
#[derive(Parser, Debug)]
#[command(version)]
struct KmsRender {
    #[clap(flatten)]
    global: GlobalArgs,
    #[clap(subcommand)]
    command: Cmd,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// The log level.
    #[clap(value_enum, long, default_value_t)]
    pub log_level: CliLogLevel,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List the connectors of a DRM device.
    Connectors(ConnectorsArgs),
    /// Select the connector, CRTC and plane a renderer would use.
    Probe(ProbeArgs),
}

#[derive(Args, Debug)]
pub struct ConnectorsArgs {
    /// The DRM device, e.g. /dev/dri/card1.
    #[arg(long)]
    pub device: Option<String>,
    /// Show all available modes.
    #[arg(long)]
    pub modes: bool,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// A JSON configuration file.
    ///
    /// Options given on the command line take precedence over the file.
    #[arg(long)]
    pub config: Option<String>,
    /// The DRM device, e.g. /dev/dri/card1.
    #[arg(long)]
    pub device: Option<String>,
    /// The kind of display to drive.
    #[arg(value_enum, long)]
    pub monitor: Option<MonitorType>,
    /// The preferred plane format, e.g. nv12 or p010.
    #[arg(long)]
    pub format: Option<String>,
}

#[derive(ValueEnum, Debug, Copy, Clone, Hash, Default)]
pub enum CliLogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Trace => Level::Trace,
            CliLogLevel::Debug => Level::Debug,
            CliLogLevel::Info => Level::Info,
            CliLogLevel::Warn => Level::Warn,
            CliLogLevel::Error => Level::Error,
        }
    }
}

pub fn main() {
    let cli = KmsRender::parse();
    Logger::install_stderr(cli.global.log_level.into());
    match cli.command {
        Cmd::Connectors(a) => connectors::main(cli.global, a),
        Cmd::Probe(a) => probe::main(cli.global, a),
    }
}
