//! `lvcat` — command-line probe for the viewer engine.
//!
//! Dumps a window of text rows or hex rows from any offset of a file, and
//! optionally runs a search first and positions the view on the hit. It is
//! the smallest end-to-end driver of the engine: everything it prints went
//! through the same window/indexer/search path the GUI shell uses.

use anyhow::{bail, Context, Result};
use clap::Parser;
use longview::{
    CancelToken, Direction, FileSource, PatternKind, SearchOutcome, SearchRequest, ViewMode,
    ViewerConfig, ViewerSession,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "lvcat", about = "Dump a window of a file through the viewer engine")]
struct Args {
    /// File to view
    file: PathBuf,

    /// Show hex rows instead of text lines
    #[arg(long)]
    hex: bool,

    /// Byte offset to start from (snapped to a row boundary)
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Number of rows to print
    #[arg(long, default_value_t = 24)]
    rows: usize,

    /// Display width in columns (wrap width when --wrap is set)
    #[arg(long, default_value_t = 80)]
    width: usize,

    /// Wrap long lines instead of reporting them
    #[arg(long)]
    wrap: bool,

    /// Search for a literal string and start the dump at the hit
    #[arg(long, conflicts_with = "pattern")]
    find: Option<String>,

    /// Search with a regex instead of a literal
    #[arg(long)]
    pattern: Option<String>,

    /// Search backward from the end of the file
    #[arg(long)]
    backward: bool,

    /// Case-insensitive search
    #[arg(long)]
    ignore_case: bool,

    /// Match whole words only
    #[arg(long)]
    whole_word: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let source = FileSource::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let mode = if args.hex { ViewMode::Hex } else { ViewMode::Text };
    let mut session =
        ViewerSession::open_with_mode(Box::new(source), ViewerConfig::default(), mode)
            .context("cannot open viewer session")?;
    session.set_wrap(args.wrap)?;

    let mut start = args.offset;
    if let Some(request) = search_request(&args) {
        let compiled = request.compile()?;
        let direction = if args.backward { Direction::Backward } else { Direction::Forward };
        session.set_search_cursor(if args.backward { session.file_size() } else { args.offset });
        match session.search(&compiled, direction, &CancelToken::new())? {
            SearchOutcome::Found { start: s, end } => {
                eprintln!("match at {s}..{end}");
                start = s;
            }
            SearchOutcome::NotFound => bail!("pattern not found"),
            SearchOutcome::Interrupted => bail!("search interrupted"),
            SearchOutcome::EmptyMatch => bail!("pattern matched zero bytes"),
        }
    }
    session.scroll_to(start)?;

    if args.hex {
        dump_hex(&mut session, args.rows)?;
    } else {
        dump_text(&mut session, args.rows, args.width)?;
    }
    Ok(())
}

fn search_request(args: &Args) -> Option<SearchRequest> {
    let pattern = match (&args.find, &args.pattern) {
        (Some(text), _) => PatternKind::Literal(text.as_bytes().to_vec()),
        (None, Some(re)) => PatternKind::Pattern(re.clone()),
        (None, None) => return None,
    };
    Some(SearchRequest {
        pattern,
        case_sensitive: !args.ignore_case,
        whole_word: args.whole_word,
    })
}

fn dump_text(session: &mut ViewerSession, rows: usize, width: usize) -> Result<()> {
    let records: Vec<_> = session.visible_lines(rows, width)?.to_vec();
    for rec in &records {
        let mut bytes = session.line_bytes(rec)?;
        session.decode_for_display(&mut bytes);
        println!("{:>10}  {}", rec.begin, String::from_utf8_lossy(&bytes));
    }
    Ok(())
}

fn dump_hex(session: &mut ViewerSession, rows: usize) -> Result<()> {
    let digits = session.hex_offset_digits();
    for rec in session.visible_records(rows) {
        let bytes = session.read_span(rec.begin, rec.begin + rec.len as u64)?;
        let mut hex = String::with_capacity(3 * 16);
        let mut ascii = String::with_capacity(16);
        for i in 0..16 {
            match bytes.get(i) {
                Some(&b) => {
                    hex.push_str(&format!("{b:02x} "));
                    ascii.push(if (0x20..0x7f).contains(&b) { b as char } else { '.' });
                }
                None => hex.push_str("   "),
            }
        }
        println!("{:0>digits$x}  {hex} {ascii}", rec.begin);
    }
    Ok(())
}
