/// Config file used when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/sf_fetch.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Instrument symbols, uppercased
    pub symbols: Vec<String>,
    pub config_path: String,
}

/// Parse `[--config <path>] SYMBOL...` (the program name already stripped)
///
/// Symbols may also be comma separated within one argument.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> CliArgs {
    let mut symbols = Vec::new();
    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            match args.next() {
                Some(path) => config_path = path,
                None => tracing::warn!("{arg} given without a path, using {config_path}"),
            }
        } else if let Some(path) = arg.strip_prefix("--config=") {
            config_path = path.to_string();
        } else {
            symbols.extend(normalise_symbols(std::iter::once(arg.as_str())));
        }
    }

    CliArgs { symbols, config_path }
}

/// Parse the process arguments
pub fn from_env() -> CliArgs {
    parse_args(std::env::args().skip(1))
}

/// Uppercase, split on commas and drop blanks
pub fn normalise_symbols<'a, I: IntoIterator<Item = &'a str>>(raw: I) -> Vec<String> {
    raw.into_iter().flat_map(|s| s.split(',')).map(str::trim).filter(|s| !s.is_empty()).map(str::to_uppercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> CliArgs {
        parse_args(raw.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_symbols_are_uppercased() {
        let parsed = args(&["btc-200730-9000-c", "ETH-200730-1000-P"]);
        assert_eq!(parsed.symbols, vec!["BTC-200730-9000-C", "ETH-200730-1000-P"]);
        assert_eq!(parsed.config_path, DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_config_flag() {
        assert_eq!(args(&["--config", "/tmp/a.toml", "btcusdt"]).config_path, "/tmp/a.toml");
        assert_eq!(args(&["btcusdt", "--config=/tmp/b.toml"]).config_path, "/tmp/b.toml");
        assert_eq!(args(&["-c", "c.toml"]).symbols, Vec::<String>::new());
        assert_eq!(args(&["--config"]).config_path, DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_comma_separated() {
        assert_eq!(args(&["btcusdt, ethusdt,,", ""]).symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }
}
