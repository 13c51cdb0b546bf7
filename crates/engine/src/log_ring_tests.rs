// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use marshal_core::Event;

fn line(i: u64) -> Envelope {
    Envelope {
        at_ms: i,
        event: Event::LogLine {
            source: "test".into(),
            content: format!("line {i}"),
            color: None,
            attachment: None,
        },
    }
}

#[test]
fn trims_oldest_on_overflow() {
    let mut ring = LogRing::new(3);
    for i in 0..5 {
        ring.push(line(i));
    }
    assert_eq!(ring.len(), 3);
    let recent = ring.recent(10);
    assert_eq!(recent.first().map(|e| e.at_ms), Some(2));
    assert_eq!(recent.last().map(|e| e.at_ms), Some(4));
}

#[test]
fn recent_returns_tail_oldest_first() {
    let mut ring = LogRing::new(10);
    for i in 0..6 {
        ring.push(line(i));
    }
    let recent = ring.recent(2);
    assert_eq!(recent.iter().map(|e| e.at_ms).collect::<Vec<_>>(), [4, 5]);
}

#[test]
fn zero_capacity_stores_nothing() {
    let mut ring = LogRing::new(0);
    ring.push(line(1));
    assert!(ring.is_empty());
}
