//! Naming discipline for the identifiers the engine injects.
//!
//! Every injected identifier has the form `amber[<N>]_<body>` where `<N>` is
//! a numeric prefix counter (blank when zero) and `<body>` says what the
//! variable is for (`tracker`, `scopeId_12`, `fnInfo_3`, …). The counter
//! exists so injected names can never collide with user code: whenever pass 1
//! scans a user identifier that itself matches the reserved pattern, the
//! counter escalates past it. Bodies are only emitted in pass 2, by which
//! time the counter is final, so a single escalation check per user name is
//! enough.

use std::sync::LazyLock;

use regex::Regex;

/// The fixed literal all injected identifiers start with.
pub const INTERNAL_VAR_PREFIX: &str = "amber";

/// Prefix of the tracker comment attached to instrumented functions.
///
/// The full comment is `amber_track:<fnId>;<fnType>;<filenameEscaped>`.
pub const TRACKER_COMMENT_PREFIX: &str = "amber_track:";

/// Matches user identifiers that would clash with the reserved pattern:
/// `amber_…`, `amber1_…`, `amber20_…` and so on.
static INTERNAL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{INTERNAL_VAR_PREFIX}([1-9][0-9]*)?_")).expect("static regex is valid"));

/// Allocates the names of injected identifiers.
///
/// Held by the shared pass state. The prefix counter is max-monotonic: it
/// only moves up, and only far enough to clear the clashing name.
#[derive(Debug)]
pub(crate) struct InternalVarAllocator {
    prefix_num: u32,
    prefix_changed: bool,
}

impl InternalVarAllocator {
    /// Starts from a prior counter value. Zero for a fresh file; eval-context
    /// code resumes from the counter the outer instrumentation finished at.
    pub fn new(prefix_num: u32) -> Self {
        Self {
            prefix_num,
            prefix_changed: false,
        }
    }

    /// Escalates the counter past a user identifier when it matches the
    /// reserved pattern. Called for every user-declared name in pass 1.
    ///
    /// `amber_x` forces the counter to at least 1, `amber7_x` to at least 8.
    pub fn check_user_name(&mut self, name: &str) {
        let Some(captures) = INTERNAL_NAME_RE.captures(name) else {
            return;
        };
        let clashing = captures
            .get(1)
            .map_or(0, |m| m.as_str().parse::<u32>().expect("regex group is a valid u32"));
        if clashing >= self.prefix_num {
            self.prefix_num = clashing + 1;
            self.prefix_changed = true;
        }
    }

    /// The current counter value. Final once pass 1 has completed.
    pub fn prefix_num(&self) -> u32 {
        self.prefix_num
    }

    /// Whether any escalation happened. When instrumenting eval-context code
    /// this tells the runtime that names emitted by the outer instrumentation
    /// no longer match.
    pub fn prefix_changed(&self) -> bool {
        self.prefix_changed
    }

    fn name(&self, body: &str) -> String {
        if self.prefix_num == 0 {
            format!("{INTERNAL_VAR_PREFIX}_{body}")
        } else {
            format!("{INTERNAL_VAR_PREFIX}{}_{body}", self.prefix_num)
        }
    }

    pub fn tracker_name(&self) -> String {
        self.name("tracker")
    }

    pub fn get_scope_id_name(&self) -> String {
        self.name("getScopeId")
    }

    pub fn scope_id_name(&self, block_id: u32) -> String {
        self.name(&format!("scopeId_{block_id}"))
    }

    /// Temp vars are numbered within their block: the first is
    /// `temp_<blockId>`, later ones `temp_<blockId>_<n>`.
    pub fn temp_name(&self, block_id: u32, ordinal: usize) -> String {
        if ordinal == 0 {
            self.name(&format!("temp_{block_id}"))
        } else {
            self.name(&format!("temp_{block_id}_{ordinal}"))
        }
    }

    pub fn fn_info_name(&self, fn_id: u32) -> String {
        self.name(&format!("fnInfo_{fn_id}"))
    }

    pub fn local_eval_name(&self) -> String {
        self.name("localEval")
    }

    pub fn get_sources_name(&self) -> String {
        self.name("getSources")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_do_not_escalate() {
        let mut alloc = InternalVarAllocator::new(0);
        alloc.check_user_name("ambergris");
        alloc.check_user_name("x");
        alloc.check_user_name("tracker");
        assert_eq!(alloc.prefix_num(), 0);
        assert!(!alloc.prefix_changed());
        assert_eq!(alloc.tracker_name(), "amber_tracker");
    }

    #[test]
    fn unnumbered_clash_escalates_to_one() {
        let mut alloc = InternalVarAllocator::new(0);
        alloc.check_user_name("amber_tracker");
        assert_eq!(alloc.prefix_num(), 1);
        assert_eq!(alloc.tracker_name(), "amber1_tracker");
        assert_eq!(alloc.scope_id_name(4), "amber1_scopeId_4");
    }

    #[test]
    fn numbered_clash_escalates_past_it() {
        let mut alloc = InternalVarAllocator::new(0);
        alloc.check_user_name("amber7_anything");
        assert_eq!(alloc.prefix_num(), 8);
        // Lower clashes no longer move the counter.
        alloc.check_user_name("amber3_x");
        assert_eq!(alloc.prefix_num(), 8);
    }

    #[test]
    fn final_counter_clears_every_user_clash() {
        // Scan order must not matter: the counter ends strictly above every
        // clashing number, so emitted names are disjoint from user names.
        for names in [["amber_x", "amber2_y"], ["amber2_y", "amber_x"]] {
            let mut alloc = InternalVarAllocator::new(0);
            for name in names {
                alloc.check_user_name(name);
            }
            assert_eq!(alloc.prefix_num(), 3);
            // The emitted prefix no longer collides with either user name.
            assert_eq!(alloc.tracker_name(), "amber3_tracker");
        }
    }

    #[test]
    fn temp_names_are_numbered_within_a_block() {
        let alloc = InternalVarAllocator::new(0);
        assert_eq!(alloc.temp_name(9, 0), "amber_temp_9");
        assert_eq!(alloc.temp_name(9, 1), "amber_temp_9_1");
    }
}
