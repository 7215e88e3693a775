//! Regex-based intent pattern matching.
//!
//! Provides pattern definitions and matching logic for detecting which
//! intent a chat message starts or asks for.

use regex::Regex;

use crate::types::Intent;

/// A single compiled regex pattern linked to an intent.
pub struct IntentPattern {
    pub regex: Regex,
    pub intent: Intent,
    pub base_confidence: f32,
    /// A start-anchored creation command that replaces any pending request.
    pub interrupts: bool,
}

/// A match result from pattern detection.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub intent: Intent,
    pub confidence: f32,
    pub matched_text: String,
    pub interrupts: bool,
}

/// Collection of all intent patterns, compiled once and reused.
pub struct PatternSet {
    patterns: Vec<IntentPattern>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSet {
    /// Create a new PatternSet with all compiled patterns.
    pub fn new() -> Self {
        let mut patterns = Vec::new();

        let mut push = |group: &[(&str, f32, bool)], intent: Intent| {
            for (pat, conf, interrupts) in group {
                patterns.push(IntentPattern {
                    regex: Regex::new(pat).expect("Invalid intent regex"),
                    intent,
                    base_confidence: *conf,
                    interrupts: *interrupts,
                });
            }
        };

        // =====================================================================
        // Task patterns
        // =====================================================================
        push(
            &[
                (
                    r"(?i)^(?:(?:aku|saya|gw|gue)\s+)?(?:buat|tambah|tambahin|ada|input|bikin|catat)\s+(?:tugas|lapres|lapsem|lapen|lp|laporan|pr|kuis|quiz|uts|uas)\b",
                    0.95,
                    true,
                ),
                (
                    r"(?i)^(?:tugas|lapres|lapsem|lapen|laporan|kuis|quiz)\b",
                    0.85,
                    false,
                ),
                (r"(?i)\bada\s+(?:tugas|kuis|quiz)\b", 0.75, false),
            ],
            Intent::CreateTask,
        );

        // =====================================================================
        // Project patterns
        // =====================================================================
        push(
            &[
                (
                    r"(?i)^(?:buat|tambah|bikin|mulai|new|create)\s+(?:project|projek|proyek)\b",
                    0.95,
                    true,
                ),
                (r"(?i)^(?:project|projek|proyek)\s+baru\b", 0.90, true),
            ],
            Intent::CreateProject,
        );

        // =====================================================================
        // Progress patterns
        // =====================================================================
        push(
            &[
                (
                    r"(?i)^(?:catat|catet|log|lapor|update|tambah)\s+(?:progress|progres)\b",
                    0.95,
                    true,
                ),
                (r"(?i)\b(?:progress|progres)\b", 0.70, false),
            ],
            Intent::LogProgress,
        );

        // =====================================================================
        // Transaction patterns
        // =====================================================================
        push(
            &[
                (
                    r"(?i)^(?:catat|catet|tambah|input)?\s*(?:pemasukan|income)\b",
                    0.95,
                    true,
                ),
                (
                    r"(?i)\b(?:gajian|dikasih|dapat|dapet|terima|cair|nemu)\b.*\d",
                    0.80,
                    false,
                ),
            ],
            Intent::AddIncome,
        );
        push(
            &[
                (
                    r"(?i)^(?:catat|catet|tambah|input)?\s*(?:pengeluaran|expense)\b",
                    0.95,
                    true,
                ),
                (
                    r"(?i)^(?:beli|bayar|jajan|makan|abis|habis|isi)\b.*\d",
                    0.80,
                    false,
                ),
                (r"(?i)\d+(?:[.,]\d+)?\s*(?:rb|ribu|k|jt|juta)\b", 0.60, false),
                (r"(?i)\b(?:gocap|cepe|gopek|sejuta)\b", 0.55, false),
            ],
            Intent::AddExpense,
        );

        // =====================================================================
        // Read-only patterns
        // =====================================================================
        push(
            &[(r"(?i)\b(?:cek\s+saldo|saldo|balance|sisa\s+uang)\b", 0.90, false)],
            Intent::CheckBalance,
        );
        push(
            &[
                (
                    r"(?i)\b(?:lihat|liat|list|riwayat|history|cek|daftar)\s+transaksi\b",
                    0.92,
                    false,
                ),
                (r"(?i)^(?:hapus|edit|ubah)\s+transaksi\b", 0.92, false),
            ],
            Intent::ListTransactions,
        );
        push(
            &[
                (
                    r"(?i)\b(?:lihat|liat|list|cek|daftar)\s+(?:tugas|deadline)\b",
                    0.92,
                    false,
                ),
                (r"(?i)\bdeadline\s+terdekat\b", 0.90, false),
            ],
            Intent::ListTasks,
        );
        push(
            &[(
                r"(?i)\b(?:lihat|liat|list|cek|daftar)\s+(?:project|projek|proyek)\b",
                0.92,
                false,
            )],
            Intent::ListProjects,
        );
        push(
            &[
                (r"(?i)^/?(?:start|help|bantuan)\b", 0.95, false),
                (r"(?i)\bbisa\s+apa\b", 0.80, false),
            ],
            Intent::Help,
        );
        push(
            &[(
                r"(?i)^(?:halo|hallo|hai|hi|hello|hey|pagi|siang|sore|malam|assalamualaikum)\b",
                0.70,
                false,
            )],
            Intent::Greeting,
        );

        Self { patterns }
    }

    /// Detect all matching patterns in the given text, sorted by confidence descending.
    pub fn detect(&self, text: &str) -> Vec<PatternMatch> {
        let text = text.trim();
        let mut matches = Vec::new();

        for pattern in &self.patterns {
            if let Some(m) = pattern.regex.find(text) {
                matches.push(PatternMatch {
                    intent: pattern.intent,
                    confidence: pattern.base_confidence,
                    matched_text: m.as_str().to_string(),
                    interrupts: pattern.interrupts,
                });
            }
        }

        // Stable: equal confidence keeps declaration order.
        matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        matches
    }

    /// The single most confident match.
    pub fn best(&self, text: &str) -> Option<PatternMatch> {
        self.detect(text).into_iter().next()
    }

    /// A strong creation command, if the message starts with one.
    pub fn interrupting(&self, text: &str) -> Option<PatternMatch> {
        self.detect(text).into_iter().find(|m| m.interrupts)
    }
}
