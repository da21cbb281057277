use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "xdbf")]
#[command(about = "dBase / FoxPro DBF table toolkit")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Log more detail to stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// How a table file is located and decoded.
#[derive(Args, Clone, Debug)]
pub struct OpenArgs {
    /// Path to a DBF table, or a zip archive containing one
    pub file: String,

    /// Text encoding (e.g. cp1251, utf-8); default: from the language driver byte
    #[arg(long)]
    pub encoding: Option<String>,

    /// Replace undecodable text instead of failing
    #[arg(long = "replace-errors")]
    pub replace_errors: bool,

    /// Lower-case field names
    #[arg(long)]
    pub lowernames: bool,

    /// Name fields as name,type,length,decimal_count
    #[arg(long = "combined-names")]
    pub combined_names: bool,

    /// Keep duplicate field names instead of suffixing .1, .2, ...
    #[arg(long = "no-rename")]
    pub no_rename: bool,

    /// Open the table even if its memo file is missing
    #[arg(long = "ignore-missing-memo")]
    pub ignore_missing_memo: bool,

    /// Stream from the file instead of reading it into memory first
    #[arg(long)]
    pub streaming: bool,

    /// Memory-map the table file
    #[arg(long)]
    pub mmap: bool,

    /// Table member name inside a zip archive
    #[arg(long)]
    pub member: Option<String>,

    /// Memo file path, or memo member name inside a zip archive
    #[arg(long)]
    pub memo: Option<String>,

    /// Match file names exactly
    #[arg(long = "case-sensitive")]
    pub case_sensitive: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show header, dialect, encoding, memo file and fields
    Info {
        #[command(flatten)]
        open: OpenArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print records as JSON
    Records {
        #[command(flatten)]
        open: OpenArgs,

        /// Print deleted records instead of active ones
        #[arg(short, long)]
        deleted: bool,

        /// Comma-separated list of columns to keep
        #[arg(short, long, value_delimiter = ',')]
        columns: Option<Vec<String>>,

        /// Stop after this many records
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print undecoded field bytes
        #[arg(long)]
        raw: bool,

        /// Narrow whole-number floats to integers
        #[arg(long = "convert-float")]
        convert_float: bool,

        /// Print one pretty JSON array instead of JSON lines
        #[arg(long)]
        pretty: bool,
    },

    /// Count active and deleted records without decoding them
    Count {
        #[command(flatten)]
        open: OpenArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Hex dump of the header block or of one physical row
    Dump {
        #[command(flatten)]
        open: OpenArgs,

        /// Physical row to dump (default: header and field descriptors)
        #[arg(short, long)]
        row: Option<u64>,

        /// Output raw binary bytes (no formatting)
        #[arg(long = "binary")]
        binary: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
