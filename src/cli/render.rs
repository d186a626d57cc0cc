//! Terminal rendering of session snapshots

use std::fmt::Write as _;
use std::io::Write;

use crate::negotiation::{
    FinishReason, NegotiationState, NoticeKind, Presenter, RoundRecord, SessionSnapshot,
};

pub fn format_amount(amount: u64) -> String {
    format!("{} €", amount)
}

/// History as a fixed-width table: `Round | Seller | Buyer | Accepted`
pub fn format_history(history: &[RoundRecord]) -> String {
    let rows: Vec<[String; 4]> = history
        .iter()
        .map(|r| {
            [
                r.round.to_string(),
                format_amount(r.seller_offer),
                r.buyer_counter.map(format_amount).unwrap_or_else(|| "-".to_string()),
                if r.accepted { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();

    let header = ["Round", "Seller", "Buyer", "Accepted"];
    let mut widths = header.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: [&str; 4]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:>width$}", cell, width = width))
            .collect();
        let _ = writeln!(out, "{}", line.join(" | "));
    };

    push_row(header);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row([&rule[0], &rule[1], &rule[2], &rule[3]]);
    for row in &rows {
        push_row([&row[0], &row[1], &row[2], &row[3]]);
    }
    out
}

/// One-line outcome of a finished session
pub fn outcome_line(snapshot: &SessionSnapshot) -> String {
    match (snapshot.state, snapshot.deal_price) {
        (NegotiationState::Accepted, Some(price)) => {
            format!("Deal reached at {}.", format_amount(price))
        }
        (NegotiationState::Aborted, _) => match snapshot.finish_reason {
            Some(FinishReason::Warnings) => {
                "No deal. The seller broke off after repeated insulting offers.".to_string()
            }
            _ => format!(
                "No deal. The seller broke off the negotiation. Last offer: {}.",
                format_amount(snapshot.current_offer)
            ),
        },
        _ => format!(
            "No deal. Last offer: {}.",
            format_amount(snapshot.current_offer)
        ),
    }
}

/// Renders snapshots as plain text lines on any writer
pub struct TerminalPresenter<W: Write> {
    out: W,
    last_offer: Option<u64>,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_offer: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl AsRef<str>) {
        if let Err(e) = writeln!(self.out, "{}", text.as_ref()).and_then(|_| self.out.flush()) {
            tracing::debug!("terminal write failed: {}", e);
        }
    }

    pub fn message(&mut self, text: impl AsRef<str>) {
        self.line(text);
    }

    /// Opening banner for a fresh session
    pub fn intro(&mut self, snapshot: &SessionSnapshot) {
        self.last_offer = Some(snapshot.initial_offer);
        let title = snapshot.label.as_deref().unwrap_or("the item");
        self.line("");
        self.line(format!("=== Negotiation started: {} ===", title));
        self.line(format!("Participant: {}", snapshot.participant_id));
        self.line(format!("Rounds: {}", snapshot.max_rounds));
        self.line("Enter a counter-offer, an empty line or `accept` to take the seller's offer, `quit` to leave.");
        self.round_prompt(snapshot);
    }

    fn round_prompt(&mut self, snapshot: &SessionSnapshot) {
        self.line("");
        self.line(format!("Round {}/{}", snapshot.round, snapshot.max_rounds));
        self.line(format!("Seller asks: {}", format_amount(snapshot.current_offer)));
    }

    /// Outcome line and the full history table
    pub fn summary(&mut self, snapshot: &SessionSnapshot) {
        self.line("");
        self.line("================= END =================");
        self.line(outcome_line(snapshot));
        if !snapshot.history.is_empty() {
            self.line("");
            self.line("History:");
            self.line(format_history(&snapshot.history).trim_end());
        }
    }

    pub fn prompt_restart(&mut self) {
        self.line("");
        self.line("Start a new negotiation? [y/N]");
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn present(&mut self, snapshot: &SessionSnapshot) {
        for notice in &snapshot.notices {
            let prefix = match notice.kind {
                NoticeKind::Rejected => "!",
                NoticeKind::Warning => "Warning:",
                NoticeKind::Advisory => "Note:",
            };
            self.line(format!("{} {}", prefix, notice.text));
        }
        if snapshot.rejection().is_some() && !snapshot.is_finished() {
            return;
        }

        if let Some(risk) = snapshot.risk_percent {
            self.line(format!("Breakdown risk of your offer: {}%", risk));
        }

        match snapshot.state {
            NegotiationState::Negotiating => {
                if let Some(previous) = self.last_offer {
                    let reduction = previous.saturating_sub(snapshot.current_offer);
                    if reduction > 0 {
                        self.line(format!("The seller comes down by {}.", format_amount(reduction)));
                    }
                }
                self.last_offer = Some(snapshot.current_offer);
                self.round_prompt(snapshot);
            }
            NegotiationState::AwaitingFinalDecision => {
                self.last_offer = Some(snapshot.current_offer);
                self.line("");
                self.line(format!(
                    "That was the last round. Final offer: {}. Accept or decline?",
                    format_amount(snapshot.current_offer)
                ));
            }
            _ => self.summary(snapshot),
        }
    }
}
