use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskKind {
    /// The debounced scan a trigger burst collapses into.
    DebouncedScan,
    /// Best-effort follow-up passes after a triggered scan, catching DOM
    /// content that lands in later paint passes. Never reschedules itself.
    SettleScan,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ScheduledTask {
    pub(crate) id: i64,
    pub(crate) due_at: i64,
    pub(crate) order: i64,
    pub(crate) kind: TaskKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanState {
    Idle,
    Scheduled { timer_id: i64 },
    Running,
}

impl Engine {
    /// Records a trigger. Bursts within the debounce window collapse into
    /// one scheduled scan; a trigger landing mid-scan re-arms a follow-up
    /// pass instead of being dropped.
    pub(crate) fn request_scan(&mut self, reason: &str) {
        if !self.config.enabled {
            self.trace.line(format!("[timer] trigger {reason} ignored: disabled"));
            return;
        }
        if !self.route_matches() {
            self.trace.line(format!("[timer] trigger {reason} ignored: off route"));
            return;
        }
        match self.scan_state {
            ScanState::Running => {
                self.rearm = true;
                self.trace.line(format!("[timer] trigger {reason} during scan, re-armed"));
            }
            ScanState::Scheduled { timer_id } => {
                self.cancel_task(timer_id);
                let timer_id = self.schedule_task(self.config.debounce_ms, TaskKind::DebouncedScan);
                self.scan_state = ScanState::Scheduled { timer_id };
                self.trace.line(format!("[timer] trigger {reason} restarted debounce"));
            }
            ScanState::Idle => {
                let timer_id = self.schedule_task(self.config.debounce_ms, TaskKind::DebouncedScan);
                self.scan_state = ScanState::Scheduled { timer_id };
                self.trace.line(format!("[timer] trigger {reason} scheduled scan"));
            }
        }
    }

    fn schedule_task(&mut self, delay_ms: i64, kind: TaskKind) -> i64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        let order = self.next_task_order;
        self.next_task_order += 1;
        self.task_queue.push(ScheduledTask {
            id,
            due_at: self.now_ms.saturating_add(delay_ms.max(0)),
            order,
            kind,
        });
        id
    }

    fn cancel_task(&mut self, id: i64) {
        self.task_queue.retain(|task| task.id != id);
    }

    pub fn now_ms(&self) -> i64 {
        self.now_ms
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        let mut timers: Vec<PendingTimer> = self
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
            })
            .collect();
        timers.sort_by_key(|timer| (timer.due_at, timer.id));
        timers
    }

    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Scheduler(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.now_ms;
        self.now_ms = self.now_ms.saturating_add(delta_ms);
        let ran = self.run_due_tasks()?;
        let line = format!(
            "[timer] advance delta_ms={delta_ms} from={from} to={} ran_due={ran}",
            self.now_ms
        );
        self.trace.line(line);
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.now_ms {
            return Err(Error::Scheduler(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.now_ms
            )));
        }
        self.advance_time(target_ms - self.now_ms)
    }

    /// Runs every queued task, advancing the clock to each task's due time.
    pub fn flush(&mut self) -> Result<()> {
        let mut steps = 0usize;
        while let Some(index) = self.next_task_index(None) {
            steps += 1;
            if steps > self.timer_step_limit {
                return Err(Error::Scheduler(format!(
                    "timer step limit exceeded ({} steps)",
                    self.timer_step_limit
                )));
            }
            let task = self.task_queue.remove(index);
            if task.due_at > self.now_ms {
                self.now_ms = task.due_at;
            }
            self.execute_task(task);
        }
        Ok(())
    }

    fn run_due_tasks(&mut self) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(index) = self.next_task_index(Some(self.now_ms)) {
            steps += 1;
            if steps > self.timer_step_limit {
                return Err(Error::Scheduler(format!(
                    "timer step limit exceeded ({} steps)",
                    self.timer_step_limit
                )));
            }
            let task = self.task_queue.remove(index);
            self.execute_task(task);
        }
        Ok(steps)
    }

    fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.is_none_or(|limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(index, _)| index)
    }

    fn execute_task(&mut self, task: ScheduledTask) {
        if !self.config.enabled {
            return;
        }
        match task.kind {
            TaskKind::DebouncedScan => {
                self.scan_state = ScanState::Running;
                self.scan();
                self.scan_state = ScanState::Idle;
                if self.rearm {
                    self.rearm = false;
                    let timer_id =
                        self.schedule_task(self.config.debounce_ms, TaskKind::DebouncedScan);
                    self.scan_state = ScanState::Scheduled { timer_id };
                }
                for delay in self.config.settle_delays_ms.clone() {
                    self.schedule_task(delay, TaskKind::SettleScan);
                }
            }
            TaskKind::SettleScan => {
                // follow-up pass only; leaves any re-armed debounce untouched
                if self.route_matches() {
                    self.scan();
                }
            }
        }
    }

    pub(crate) fn route_matches(&self) -> bool {
        match &self.route_re {
            Some(re) => re.is_match(&self.location).unwrap_or(false),
            None => true,
        }
    }

    /// Reports a completed host AJAX request. Only requests matching the
    /// listing's data-fetch endpoint pattern schedule a rescan.
    pub fn notify_ajax_complete(&mut self, url: &str) {
        let matched = match &self.endpoint_re {
            Some(re) => re.is_match(url).unwrap_or(false),
            None => false,
        };
        if matched {
            self.request_scan("ajax");
        } else {
            self.trace.line(format!("[timer] ajax url ignored: {url}"));
        }
    }

    /// The host page's render-finished signal. Authoritative: it always
    /// counts as a trigger, with no added-node heuristics in between.
    pub fn dispatch_render_finished(&mut self) {
        self.request_scan("render-finished");
    }
}
