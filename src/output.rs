//! Output formatting for search results and thesaurus listings

use crate::query::highlight::matched_spans;
use crate::query::{ResultSet, SearchHit};
use crate::thesaurus::SynonymTable;
use crate::utils::Analyzer;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout(color: bool) -> StandardStream {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print a page of results with matched words highlighted
pub fn print_results(
    result: &ResultSet,
    top_index: usize,
    analyzer: &Analyzer,
    color: bool,
) -> io::Result<()> {
    let mut stdout = stdout(color);
    write_results(&mut stdout, result, top_index, analyzer)
}

/// Write a page of results to any colour-capable writer
pub fn write_results<W: WriteColor>(
    out: &mut W,
    result: &ResultSet,
    top_index: usize,
    analyzer: &Analyzer,
) -> io::Result<()> {
    if let Some(corrected) = &result.corrected_query_string {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(
            out,
            "Showing results for \"{}\" (searched \"{}\")",
            corrected, result.requested_query_string
        )?;
        out.reset()?;
    }
    if let Some(suggested) = &result.suggested_query_string {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
        writeln!(out, "Did you mean \"{}\"?", suggested)?;
        out.reset()?;
    }

    if result.results.is_empty() {
        writeln!(out, "{} matches", result.match_count)?;
        return Ok(());
    }

    writeln!(
        out,
        "{} matches, showing {}-{}",
        result.match_count,
        top_index + 1,
        top_index + result.item_count
    )?;

    for (rank, hit) in result.results.iter().enumerate() {
        writeln!(out)?;
        write_hit(out, top_index + rank + 1, hit, result, analyzer)?;
    }

    Ok(())
}

fn write_hit<W: WriteColor>(
    out: &mut W,
    rank: usize,
    hit: &SearchHit,
    result: &ResultSet,
    analyzer: &Analyzer,
) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(out, "{}.", rank)?;
    out.reset()?;
    write!(out, " ")?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    write!(out, "{:.3}", hit.weight)?;
    out.reset()?;
    writeln!(out, " (doc {})", hit.doc_id)?;

    for (field, values) in &hit.fields {
        for value in values {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(out, "   {}", field)?;
            out.reset()?;
            write!(out, ": ")?;
            write_highlighted(out, value, result, analyzer)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Write `text` with the words matching the query terms in bold red
fn write_highlighted<W: WriteColor>(
    out: &mut W,
    text: &str,
    result: &ResultSet,
    analyzer: &Analyzer,
) -> io::Result<()> {
    let mut cursor = 0;
    for (start, end, _) in matched_spans(analyzer, &result.query_terms, text) {
        if start > cursor {
            write!(out, "{}", &text[cursor..start])?;
        }
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(out, "{}", &text[start..end])?;
        out.reset()?;
        cursor = end;
    }
    if cursor < text.len() {
        write!(out, "{}", &text[cursor..])?;
    }
    Ok(())
}

/// Print every synonym entry, one word per line
pub fn print_synonyms(table: &SynonymTable, color: bool) -> io::Result<()> {
    let mut stdout = stdout(color);

    if table.is_empty() {
        writeln!(stdout, "No synonyms defined.")?;
        return Ok(());
    }

    for (word, synonyms) in table.iter() {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(stdout, "{}", word)?;
        stdout.reset()?;
        let list: Vec<&str> = synonyms.iter().map(String::as_str).collect();
        writeln!(stdout, " -> {}", list.join(", "))?;
    }
    Ok(())
}

/// Print completions for a word fragment
pub fn print_suggestions(words: &[String]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    for word in words {
        writeln!(lock, "{}", word)?;
    }
    Ok(())
}
