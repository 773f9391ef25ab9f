use crate::system::System;
use std::collections::VecDeque;

pub type Handler = fn(&mut System);

pub struct ScheduledEvent {
    pub cycle: u64,
    pub handler: Handler,
}

pub struct Scheduler {
    elapsed: u64,
    scheduled: VecDeque<ScheduledEvent>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("elapsed", &self.elapsed)
            .field("scheduled", &self.scheduled.len())
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            elapsed: 0,
            scheduled: VecDeque::with_capacity(16),
        }
    }
}

impl Scheduler {
    /// Schedules `handler` to run `after` cycles from now. Events scheduled for the same cycle run
    /// in the order they were scheduled.
    #[inline(always)]
    pub fn schedule(&mut self, after: u64, handler: Handler) {
        let cycle = self.elapsed + after;
        let index = self.scheduled.partition_point(|e| e.cycle <= cycle);
        self.scheduled
            .insert(index, ScheduledEvent { cycle, handler });
    }

    #[inline(always)]
    pub fn cancel(&mut self, handler: Handler) {
        self.scheduled
            .retain(|x| !std::ptr::fn_addr_eq(x.handler, handler));
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    pub fn advance(&mut self, count: u64) {
        self.elapsed += count;
    }

    #[inline(always)]
    pub fn until_next(&self) -> Option<u64> {
        self.scheduled.front().map(|e| e.cycle - self.elapsed)
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Option<Handler> {
        self.scheduled
            .pop_front_if(|e| e.cycle <= self.elapsed)
            .map(|e| e.handler)
    }

    /// How many cycles have elapsed.
    #[inline(always)]
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn first(sys: &mut System) {
        sys.intc.stat |= 1;
    }

    fn second(sys: &mut System) {
        sys.intc.stat |= 2;
    }

    #[test]
    fn ordering() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(10, second);
        scheduler.schedule(5, first);
        scheduler.schedule(10, first);

        assert_eq!(scheduler.len(), 3);
        assert_eq!(scheduler.until_next(), Some(5));
        assert!(scheduler.pop().is_none());

        scheduler.advance(5);
        assert!(scheduler.pop().is_some_and(|h| std::ptr::fn_addr_eq(h, first as Handler)));
        assert!(scheduler.pop().is_none());

        scheduler.advance(5);
        assert!(scheduler.pop().is_some_and(|h| std::ptr::fn_addr_eq(h, second as Handler)));
        assert!(scheduler.pop().is_some_and(|h| std::ptr::fn_addr_eq(h, first as Handler)));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn cancel() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(1, first);
        scheduler.schedule(2, second);
        scheduler.schedule(3, first);

        scheduler.cancel(first);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.until_next(), Some(2));
    }
}
