//! Test Helper Utilities
//!
//! Shared utilities for testing bibflow-import

#![allow(dead_code)]

pub mod log_capture;
pub mod mock_fetchers;

// Re-export commonly used items
pub use log_capture::{capture_logs, LogCapture};
pub use mock_fetchers::{
    article, MockFetcher, MockFulltext, MockSearch, Outcome, RecordingTransport,
};

/// BibTeX database exercising every migration
pub const LEGACY_DATABASE: &str = r#"% Encoding: UTF-8

@String{acm = {Association for Computing Machinery}}

@Article{knuth1974,
  author         = {Knuth, Donald E.},
  title          = {Computer Programming as an Art},
  journal        = {Communications of the ACM},
  publisher      = acm,
  year           = {1974},
  keywords       = {classics, prio1, read},
  __markedentry  = {[alice:3]},
}

@Book{sicp,
  author    = {Abelson, Harold and Sussman, Gerald Jay},
  title     = {Structure and Interpretation of Computer Programs},
  year      = 1985,
  isbn      = {0-262-01077-1},
  keywords  = {lisp; textbook},
}

@comment{jabref-meta: groupstree:
0 AllEntriesGroup:;
1 ExplicitGroup:Reading List\;0\;knuth1974\;sicp\;;
2 ExplicitGroup:Essays\;0\;knuth1974\;;
}
"#;
