use std::collections::HashMap;
use std::time::Instant;

use log::{debug, trace};

use crate::api::{PlaceBetRequest, Question, QuestionId};
use crate::draft::{BetDraft, DraftError, DraftState, DraftTimings, Summary};

#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    pub question: QuestionId,
    pub attempt: u64,
    pub request: PlaceBetRequest,
}

#[derive(Debug, Default)]
pub struct BetBoard {
    drafts: HashMap<QuestionId, BetDraft>,
    timings: DraftTimings,
}

impl BetBoard {
    pub fn new(timings: DraftTimings) -> Self {
        Self {
            drafts: HashMap::new(),
            timings,
        }
    }
    pub fn expand(&mut self, question: &QuestionId) -> &BetDraft {
        self.drafts
            .entry(question.clone())
            .or_insert_with(|| BetDraft::open(question.clone(), self.timings))
    }
    pub fn collapse(&mut self, question: &QuestionId) {
        if let Some(mut draft) = self.drafts.remove(question) {
            if draft.is_submitting() {
                debug!("Question {} collapsed while its bet is in flight", question);
            }
            draft.collapse();
        }
    }
    pub fn toggle(&mut self, question: &QuestionId) -> bool {
        if self.drafts.contains_key(question) {
            self.collapse(question);
            false
        } else {
            self.expand(question);
            true
        }
    }
    pub fn draft(&self, question: &QuestionId) -> Option<&BetDraft> {
        self.drafts.get(question)
    }
    pub fn state(&self, question: &QuestionId) -> DraftState {
        self.drafts
            .get(question)
            .map(|draft| draft.state().clone())
            .unwrap_or(DraftState::Collapsed)
    }
    pub fn select_option(&mut self, question: &Question, label: &str) -> Result<(), DraftError> {
        self.draft_mut(&question.id)?.select_option(question, label)
    }
    pub fn enter_amount(&mut self, question: &QuestionId, raw: &str) -> Result<String, DraftError> {
        Ok(self.draft_mut(question)?.enter_amount(raw)?.to_string())
    }
    pub fn request_confirmation(
        &mut self,
        question: &Question,
        now: Instant,
    ) -> Result<Summary, DraftError> {
        self.draft_mut(&question.id)?
            .request_confirmation(question, now)
    }
    pub fn begin(&mut self, question: &QuestionId) -> Result<Ticket, DraftError> {
        let (request, attempt) = self.draft_mut(question)?.begin_submission()?;
        trace!("Submitting attempt {} on question {}", attempt, question);
        Ok(Ticket {
            question: question.clone(),
            attempt,
            request,
        })
    }
    // Reports the outcome of `ticket` back to its draft. Returns false when
    // the card was closed or restarted in the meantime.
    pub fn finish(&mut self, ticket: &Ticket, outcome: Result<(), String>, now: Instant) -> bool {
        let Some(draft) = self.drafts.get_mut(&ticket.question) else {
            debug!("Dropping outcome for closed question {}", ticket.question);
            return false;
        };
        match outcome {
            Ok(()) => draft.submission_succeeded(ticket.attempt, now),
            Err(reason) => draft.submission_failed(ticket.attempt, reason),
        }
    }
    pub fn tick(&mut self, now: Instant) -> bool {
        self.drafts
            .values_mut()
            .fold(false, |changed, draft| draft.tick(now) || changed)
    }
    pub fn next_deadline(&self) -> Option<Instant> {
        self.drafts
            .values()
            .filter_map(BetDraft::next_deadline)
            .min()
    }
    pub fn open_questions(&self) -> impl Iterator<Item = &QuestionId> {
        self.drafts.keys()
    }

    fn draft_mut(&mut self, question: &QuestionId) -> Result<&mut BetDraft, DraftError> {
        self.drafts.get_mut(question).ok_or(DraftError::Collapsed)
    }
}
