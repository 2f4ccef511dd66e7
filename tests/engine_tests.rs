// End-to-end tests over real files: the engine drives FileSource through
// WindowBuffer exactly as the shell would.

use longview::{
    BoundaryKind, ByteSource, CancelToken, Direction, FileSource, Growth, PatternKind,
    SearchOutcome, SearchRequest, ViewMode, ViewerConfig, ViewerSession,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(content: &[u8]) -> NamedTempFile {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(content).unwrap();
    f.flush().unwrap();
    f
}

fn text_session(content: &[u8]) -> (NamedTempFile, ViewerSession) {
    let f = write_temp(content);
    let src = FileSource::open(f.path()).unwrap();
    let s = ViewerSession::open_with_mode(Box::new(src), ViewerConfig::default(), ViewMode::Text)
        .unwrap();
    (f, s)
}

/// A file much larger than the 60 000-byte window.
fn big_file_content() -> Vec<u8> {
    let mut data = Vec::with_capacity(2 << 20);
    for i in 0..40_000 {
        data.extend_from_slice(format!("record {i:06} ==== payload {} \n", "x".repeat(i % 37)).as_bytes());
    }
    data
}

#[test]
fn scrolling_through_a_file_larger_than_the_window() {
    let content = big_file_content();
    let (_f, mut s) = text_session(&content);
    assert_eq!(s.file_size(), content.len() as u64);

    // Scroll deep into the file and verify the rows match the real bytes.
    s.scroll_to(content.len() as u64 / 2).unwrap();
    let rows: Vec<_> = s.visible_lines(10, 200).unwrap().to_vec();
    assert_eq!(rows.len(), 10);
    for rec in &rows {
        let bytes = s.line_bytes(rec).unwrap();
        let expect = &content[rec.begin as usize..rec.end as usize];
        assert_eq!(bytes, expect);
        assert!(bytes.starts_with(b"record "), "top must snap to a line begin");
    }

    // Scrolling up one row from a mid-file top lands on the previous line.
    let top = s.top_offset();
    s.scroll_up(1).unwrap();
    let up = s.top_offset();
    assert!(up < top);
    s.scroll_down(1).unwrap();
    assert_eq!(s.top_offset(), top, "down undoes up exactly");
}

#[test]
fn search_crosses_window_refills() {
    let mut content = big_file_content();
    // Plant a needle far from the start, then another further on.
    let first = 1_200_000usize.min(content.len() - 100);
    let second = first + 300_000.min(content.len() - first - 100);
    content[first..first + 6].copy_from_slice(b"NEEDLE");
    content[second..second + 6].copy_from_slice(b"NEEDLE");

    let (_f, mut s) = text_session(&content);
    let cs = SearchRequest {
        pattern: PatternKind::Literal(b"NEEDLE".to_vec()),
        case_sensitive: true,
        whole_word: false,
    }
    .compile()
    .unwrap();

    let out = s.search(&cs, Direction::Forward, &CancelToken::new()).unwrap();
    assert_eq!(out, SearchOutcome::Found { start: first as u64, end: first as u64 + 6 });

    let out = s.search(&cs, Direction::Forward, &CancelToken::new()).unwrap();
    assert_eq!(out, SearchOutcome::Found { start: second as u64, end: second as u64 + 6 });

    // Flip: the second hit is re-found, then the first again.
    let out = s.search(&cs, Direction::Backward, &CancelToken::new()).unwrap();
    assert_eq!(out, SearchOutcome::Found { start: second as u64, end: second as u64 + 6 });
    let out = s.search(&cs, Direction::Backward, &CancelToken::new()).unwrap();
    assert_eq!(out, SearchOutcome::Found { start: first as u64, end: first as u64 + 6 });
}

/// Source wrapper that fires a cancel token after a number of reads,
/// standing in for a user pressing Esc mid-search.
struct CancellingSource {
    inner: FileSource,
    token: CancelToken,
    reads_left: usize,
}

impl ByteSource for CancellingSource {
    fn size(&mut self) -> std::io::Result<u64> {
        self.inner.size()
    }
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.reads_left == 0 {
            self.token.cancel();
        } else {
            self.reads_left -= 1;
        }
        self.inner.read_at(offset, buf)
    }
}

#[test]
fn cancellation_mid_search_preserves_cursor() {
    let content = big_file_content();
    let f = write_temp(&content);
    let token = CancelToken::new();
    let src = CancellingSource {
        inner: FileSource::open(f.path()).unwrap(),
        token: token.clone(),
        reads_left: 10,
    };
    let mut s =
        ViewerSession::open_with_mode(Box::new(src), ViewerConfig::default(), ViewMode::Text)
            .unwrap();

    let cs = SearchRequest {
        pattern: PatternKind::Literal(b"WILL-NEVER-MATCH".to_vec()),
        case_sensitive: true,
        whole_word: false,
    }
    .compile()
    .unwrap();
    s.set_search_cursor(12_345);
    let out = s.search(&cs, Direction::Forward, &token).unwrap();
    assert_eq!(out, SearchOutcome::Interrupted);
    assert_eq!(s.search_cursor(), 12_345, "interrupted search rolls back");
    assert!(s.selection().is_empty(), "no selection from an aborted search");
}

#[test]
fn truncation_under_foot_is_survivable() {
    let content = big_file_content();
    let f = write_temp(&content);
    let src = FileSource::open(f.path()).unwrap();
    let mut s =
        ViewerSession::open_with_mode(Box::new(src), ViewerConfig::default(), ViewMode::Text)
            .unwrap();

    s.scroll_to(content.len() as u64 - 5_000).unwrap();
    s.click(content.len() as u64 - 4_000);
    s.drag_to(content.len() as u64 - 3_000);

    // Truncate the real file while the session points into the lost tail.
    f.as_file().set_len(10_000).unwrap();
    s.file_changed().unwrap();

    assert!(s.top_offset() <= 10_000);
    let rows: Vec<_> = s.visible_lines(5, 200).unwrap().to_vec();
    assert!(!rows.is_empty());
    for rec in &rows {
        assert!(rec.end <= 10_000);
        let expect = &content[rec.begin as usize..rec.end as usize];
        assert_eq!(s.line_bytes(rec).unwrap(), expect);
    }
    if let Some((_, end)) = s.selection().span() {
        assert!(end <= 10_000);
    }
}

#[test]
fn long_line_fallback_end_to_end() {
    let mut content = vec![b'y'; 20_000];
    content.push(b'\n');
    content.extend_from_slice(b"short line\n");
    let (_f, mut s) = text_session(&content);

    let err = s.visible_lines(10, 80).unwrap_err();
    assert!(matches!(err, longview::ViewError::LongLine { begin: 0 }));

    // Choice one: hex mode.
    s.set_mode(ViewMode::Hex).unwrap();
    let rows = s.visible_records(3);
    assert_eq!(rows[0].begin, 0);
    assert_eq!(rows[0].len, 16);

    // Choice two: force text; the ceiling cut reads like a wrapped row.
    s.set_mode(ViewMode::Text).unwrap();
    s.force_text_mode(true);
    let rows: Vec<_> = s.visible_lines(4, 80).unwrap().to_vec();
    assert_eq!(rows[0].end, 10_000);
    assert_eq!(rows[0].boundary, BoundaryKind::Wrap);
    assert_eq!(rows[1].begin, 10_000);
}

#[test]
fn eof_without_trailing_eol() {
    let (_f, mut s) = text_session(b"first\nsecond\nlast without eol");
    let rows: Vec<_> = s.visible_lines(10, 80).unwrap().to_vec();
    assert_eq!(rows.len(), 3);
    let last = rows[2];
    assert_eq!(last.end, s.file_size());
    assert_eq!(last.next_begin, s.file_size());
    assert_eq!(last.boundary, BoundaryKind::EndOfFile);
}

#[test]
fn hex_and_text_views_agree_on_offsets() {
    let content = big_file_content();
    let (_f, mut s) = text_session(&content);

    s.scroll_to(77_777).unwrap();
    let text_top = s.top_offset();
    s.set_mode(ViewMode::Hex).unwrap();
    assert_eq!(s.top_offset() % 16, 0);
    assert!(s.top_offset() <= text_top);

    let rows = s.visible_records(4);
    let bytes = s.read_span(rows[0].begin, rows[0].begin + rows[0].len as u64).unwrap();
    assert_eq!(bytes, &content[rows[0].begin as usize..rows[0].begin as usize + 16]);
}

#[test]
fn wrapped_selection_round_trip_on_disk() {
    // One long line that wraps at width 10, then a short one.
    let mut content = Vec::new();
    content.extend_from_slice("abcdefghijKLMNOPQRSTuvwxyz".as_bytes());
    content.push(b'\n');
    content.extend_from_slice(b"tail");
    let (_f, mut s) = text_session(&content);
    s.set_wrap(true).unwrap();
    s.visible_lines(6, 10).unwrap();

    // Offset 10 is a wrap join: row 0 ends there, row 1 begins there.
    assert_eq!(s.coord_at(10, Growth::Forward).unwrap(), Some((0, 10)));
    assert_eq!(s.coord_at(10, Growth::Backward).unwrap(), Some((1, 0)));

    // Away from joins both growths agree and round-trip.
    for offset in [0u64, 5, 13, 22, 28] {
        let fwd = s.coord_at(offset, Growth::Forward).unwrap().unwrap();
        let bwd = s.coord_at(offset, Growth::Backward).unwrap().unwrap();
        assert_eq!(fwd, bwd, "offset {offset} is not a join");
        assert_eq!(s.offset_at(fwd.0, fwd.1).unwrap(), Some(offset));
    }
}

#[test]
fn whole_word_search_over_a_real_file() {
    let mut content = b"concatenate cat scatter\n".to_vec();
    content.extend_from_slice(&big_file_content()[..100_000]);
    let (_f, mut s) = text_session(&content);

    let cs = SearchRequest {
        pattern: PatternKind::Literal(b"cat".to_vec()),
        case_sensitive: true,
        whole_word: true,
    }
    .compile()
    .unwrap();
    let out = s.search(&cs, Direction::Forward, &CancelToken::new()).unwrap();
    assert_eq!(out, SearchOutcome::Found { start: 12, end: 15 });
    let out = s.search(&cs, Direction::Forward, &CancelToken::new()).unwrap();
    assert_eq!(out, SearchOutcome::NotFound);
}

#[test]
fn regex_search_finds_lines_deep_in_the_file() {
    let content = big_file_content();
    let (_f, mut s) = text_session(&content);

    let cs = SearchRequest {
        pattern: PatternKind::Pattern(r"record 0239\d\d ".to_string()),
        case_sensitive: true,
        whole_word: false,
    }
    .compile()
    .unwrap();
    let out = s.search(&cs, Direction::Forward, &CancelToken::new()).unwrap();
    let SearchOutcome::Found { start, end } = out else {
        panic!("expected a hit, got {out:?}");
    };
    assert_eq!(&content[start as usize..end as usize - 1], b"record 023900");
}
