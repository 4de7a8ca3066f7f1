//! Output header preparation: `@PG` chaining and sort-order marking.

use anyhow::Result;
use bstr::BString;
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::Program;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use noodles::sam::header::record::value::map::program::tag;
use std::collections::HashSet;

/// Program ID and name used for the `@PG` record.
pub const PROGRAM_ID: &str = "fgslice";

/// Get the ID of the last program in the `@PG` chain, i.e. the one no other program
/// references through `PP`.
#[must_use]
pub fn get_last_program_id(header: &Header) -> Option<String> {
    let program_map = header.programs().as_ref();
    if program_map.is_empty() {
        return None;
    }

    let referenced: HashSet<&[u8]> = program_map
        .values()
        .filter_map(|pg| pg.other_fields().get(&tag::PREVIOUS_PROGRAM_ID))
        .map(AsRef::as_ref)
        .collect();

    program_map
        .keys()
        .find(|id| !referenced.contains(id.as_slice()))
        .or_else(|| program_map.keys().next())
        .map(|id| String::from_utf8_lossy(id).to_string())
}

/// Returns `base_id`, or `base_id.N` for the smallest N that does not collide.
#[must_use]
pub fn make_unique_program_id(header: &Header, base_id: &str) -> String {
    let program_map = header.programs().as_ref();
    if !program_map.contains_key(base_id.as_bytes()) {
        return base_id.to_string();
    }
    (1..)
        .map(|i| format!("{base_id}.{i}"))
        .find(|candidate| !program_map.contains_key(candidate.as_bytes()))
        .unwrap_or_else(|| format!("{base_id}.{}", std::process::id()))
}

/// Add an `@PG` record to the header, chained to the previous last program.
///
/// # Errors
///
/// Returns an error if the program record cannot be built or added.
pub fn add_pg_record(mut header: Header, version: &str, command_line: &str) -> Result<Header> {
    let previous_program = get_last_program_id(&header);
    let unique_id = make_unique_program_id(&header, PROGRAM_ID);

    let mut builder = Map::<Program>::builder()
        .insert(tag::NAME, PROGRAM_ID)
        .insert(tag::VERSION, version)
        .insert(tag::COMMAND_LINE, command_line);
    if let Some(pp) = previous_program.as_deref() {
        builder = builder.insert(tag::PREVIOUS_PROGRAM_ID, pp);
    }

    header.programs_mut().add(BString::from(unique_id), builder.build()?)?;
    Ok(header)
}

/// Set `SO:unsorted` on the header and drop any grouping or sub-sort order.
///
/// Slice output interleaves records from independently scheduled partitions, so the input sort
/// order no longer holds.
#[must_use]
pub fn mark_unsorted(header: Header) -> Header {
    let mut hd = header.header().cloned().unwrap_or_default();
    let fields = hd.other_fields_mut();
    fields.insert(header_tag::SORT_ORDER, BString::from("unsorted"));
    fields.swap_remove(&header_tag::GROUP_ORDER);
    fields.swap_remove(&header_tag::SUBSORT_ORDER);

    let mut builder = Header::builder().set_header(hd);
    for (name, reference) in header.reference_sequences() {
        builder = builder.add_reference_sequence(name.clone(), reference.clone());
    }
    for (id, rg) in header.read_groups() {
        builder = builder.add_read_group(id.clone(), rg.clone());
    }
    for (id, pg) in header.programs().as_ref() {
        builder = builder.add_program(id.clone(), pg.clone());
    }
    for comment in header.comments() {
        builder = builder.add_comment(comment.clone());
    }
    builder.build()
}
