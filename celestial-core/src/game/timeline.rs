/// 固定延迟触发的提示（cue）队列。
///
/// 控制器在加载时把编排好的步骤按延迟登记进来，每帧用帧间隔推进；到期的 cue 按截止时间顺序返回，
/// 截止时间相同则按登记顺序返回。`Timeline` 归控制器所有，控制器销毁后未触发的 cue 也随之丢弃。
///
/// # 示例
///
/// ```
/// use celestial_core::game::timeline::Timeline;
///
/// let mut timeline = Timeline::new();
/// timeline.schedule(2.25, "shrink logo");
/// timeline.schedule(0.0, "grow logo");
///
/// assert_eq!(timeline.advance(0.016), vec!["grow logo"]);
/// assert!(timeline.advance(1.0).is_empty());
/// assert_eq!(timeline.advance(1.5), vec!["shrink logo"]);
/// ```
#[derive(Debug, Clone)]
pub struct Timeline<C> {
    now: f64,
    next_seq: u64,
    pending: Vec<Pending<C>>,
}

#[derive(Debug, Clone)]
struct Pending<C> {
    deadline: f64,
    seq: u64,
    cue: C,
}

impl<C> Default for Timeline<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Timeline<C> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_seq: 0,
            pending: Vec::new(),
        }
    }

    /// 从当前时刻起 `after` 秒后触发 `cue`。负值按 0 处理。
    pub fn schedule(&mut self, after: f32, cue: C) {
        let deadline = self.now + f64::from(after.max(0.0));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending { deadline, seq, cue });
    }

    /// 推进 `delta` 秒并返回所有到期的 cue。
    pub fn advance(&mut self, delta: f32) -> Vec<C> {
        self.now += f64::from(delta.max(0.0));
        let now = self.now;

        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.deadline <= now);
        self.pending = pending;

        due.sort_by(|a, b| a.deadline.total_cmp(&b.deadline).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|p| p.cue).collect()
    }

    /// 自创建以来经过的时间（秒）。
    pub fn elapsed(&self) -> f64 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_cues_come_out_in_deadline_order() {
        let mut timeline = Timeline::new();
        timeline.schedule(8.0, 'c');
        timeline.schedule(1.5, 'a');
        timeline.schedule(6.0, 'b');

        assert!(timeline.advance(1.0).is_empty());
        assert_eq!(timeline.advance(10.0), vec!['a', 'b', 'c']);
        assert!(timeline.is_idle());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut timeline = Timeline::new();
        for cue in 0..5 {
            timeline.schedule(1.0, cue);
        }
        assert_eq!(timeline.advance(1.0), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn schedule_is_relative_to_current_time() {
        let mut timeline = Timeline::new();
        assert!(timeline.advance(5.0).is_empty());
        timeline.schedule(1.0, "later");
        assert!(timeline.advance(0.5).is_empty());
        assert_eq!(timeline.pending(), 1);
        assert_eq!(timeline.advance(0.5), vec!["later"]);
        assert!((timeline.elapsed() - 6.0).abs() < 1e-9);
    }

    #[test]
    fn cue_at_exact_deadline_fires() {
        let mut timeline = Timeline::new();
        timeline.schedule(0.25, ());
        timeline.schedule(0.25, ());
        assert_eq!(timeline.advance(0.25).len(), 2);
    }
}
