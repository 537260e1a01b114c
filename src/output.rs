//! Output formatting for name, content and metadata search results

use crate::index::metadata::FileMetadata;
use crate::index::stats::format_size;
use crate::query::FindResult;
use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print name matches, then content matches under their own heading
pub fn print_find_result(result: &FindResult, color: bool, show_scores: bool) -> io::Result<()> {
    write_find_result(&mut stdout(color), result, show_scores)
}

pub fn write_find_result<W: WriteColor>(
    out: &mut W,
    result: &FindResult,
    show_scores: bool,
) -> io::Result<()> {
    for m in &result.name_matches {
        if show_scores {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
            write!(out, "{:>4} ", m.score)?;
            out.reset()?;
        }
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        writeln!(out, "{}", m.path.display())?;
        out.reset()?;
    }

    if result.content_matches.is_empty() {
        return Ok(());
    }

    if !result.name_matches.is_empty() {
        writeln!(out)?;
    }
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    writeln!(out, "content matches:")?;
    out.reset()?;
    for path in &result.content_matches {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        writeln!(out, "{}", path)?;
        out.reset()?;
    }

    Ok(())
}

/// Print metadata search results, one file per line
pub fn print_metadata(records: &[FileMetadata], color: bool, long: bool) -> io::Result<()> {
    write_metadata(&mut stdout(color), records, long)
}

pub fn write_metadata<W: WriteColor>(
    out: &mut W,
    records: &[FileMetadata],
    long: bool,
) -> io::Result<()> {
    for record in records {
        if long {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
            write!(out, "{:>12} ", format_size(record.size))?;
            out.reset()?;
            out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
            write!(out, "m:{} a:{} c:{} ", record.mtime, record.atime, record.ctime)?;
            out.reset()?;
        }
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        writeln!(out, "{}", record.path)?;
        out.reset()?;
    }
    Ok(())
}
