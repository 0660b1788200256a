//! 节点动作：对节点变换做随时间推进的增量修改。
//!
//! 动作是纯描述（可克隆、可复用），运行状态保存在 [`RunningAction`] 中。
//! 每帧以 `[elapsed, elapsed + delta]` 区间上的累计量差值修改节点变换，
//! 因此线性动作的结果与帧率无关，序列中上一步剩余的时间会自然流入下一步。

use std::ops::{Add, AddAssign, Neg, Sub};

use nalgebra::Vector3;

use super::component::transform::Transform;

/// 动作在一段时间内对变换造成的增量。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionDelta {
    pub rotation: Vector3<f32>,
    pub translation: Vector3<f32>,
}

impl ActionDelta {
    pub fn zero() -> Self {
        Self {
            rotation: Vector3::zeros(),
            translation: Vector3::zeros(),
        }
    }

    fn scaled(self, factor: f32) -> Self {
        Self {
            rotation: self.rotation * factor,
            translation: self.translation * factor,
        }
    }

    /// 把增量叠加到变换上。
    pub fn apply(&self, transform: &mut Transform) {
        transform.rotate(self.rotation);
        transform.translate(self.translation);
    }
}

impl Add for ActionDelta {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            rotation: self.rotation + rhs.rotation,
            translation: self.translation + rhs.translation,
        }
    }
}

impl AddAssign for ActionDelta {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for ActionDelta {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for ActionDelta {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            rotation: -self.rotation,
            translation: -self.translation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ActionKind {
    RotateBy(Vector3<f32>),
    MoveBy(Vector3<f32>),
    Wait,
    Sequence(Vec<Action>),
    RepeatForever(Box<Action>),
}

/// 节点动作描述。
///
/// # 示例
///
/// ```
/// use celestial_core::game::action::Action;
/// use nalgebra::Vector3;
///
/// // 4 秒上移 0.6，再用 4 秒移回，无限循环
/// let bob = Action::move_by(Vector3::new(0.0, 0.6, 0.0), 4.0);
/// let action = Action::repeat_forever(Action::sequence([bob.clone(), bob.reversed()]));
/// assert!(action.duration().is_infinite());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    kind: ActionKind,
    duration: f32,
}

impl Action {
    /// 在 `duration` 秒内按欧拉角增量旋转（弧度）。
    pub fn rotate_by(angles: Vector3<f32>, duration: f32) -> Self {
        Self {
            kind: ActionKind::RotateBy(angles),
            duration: duration.max(0.0),
        }
    }

    /// 在 `duration` 秒内平移（父空间坐标）。
    pub fn move_by(delta: Vector3<f32>, duration: f32) -> Self {
        Self {
            kind: ActionKind::MoveBy(delta),
            duration: duration.max(0.0),
        }
    }

    pub fn wait(duration: f32) -> Self {
        Self {
            kind: ActionKind::Wait,
            duration: duration.max(0.0),
        }
    }

    /// 依次执行多个动作。
    pub fn sequence(actions: impl IntoIterator<Item = Action>) -> Self {
        let actions: Vec<Action> = actions.into_iter().collect();
        let duration = actions.iter().map(|a| a.duration).sum();
        Self {
            kind: ActionKind::Sequence(actions),
            duration,
        }
    }

    /// 无限重复；时长为零的动作重复后不产生任何效果。
    pub fn repeat_forever(action: Action) -> Self {
        Self {
            kind: ActionKind::RepeatForever(Box::new(action)),
            duration: f32::INFINITY,
        }
    }

    /// 反向动作：增量取反，序列倒序。
    pub fn reversed(&self) -> Self {
        let kind = match &self.kind {
            ActionKind::RotateBy(angles) => ActionKind::RotateBy(-angles),
            ActionKind::MoveBy(delta) => ActionKind::MoveBy(-delta),
            ActionKind::Wait => ActionKind::Wait,
            ActionKind::Sequence(actions) => {
                ActionKind::Sequence(actions.iter().rev().map(Action::reversed).collect())
            }
            ActionKind::RepeatForever(inner) => ActionKind::RepeatForever(Box::new(inner.reversed())),
        };
        Self {
            kind,
            duration: self.duration,
        }
    }

    /// 总时长（秒）；`repeat_forever` 为无穷大。
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// 动作完整执行一次的总增量（无限重复的动作返回零）。
    fn total(&self) -> ActionDelta {
        match &self.kind {
            ActionKind::RotateBy(angles) => ActionDelta {
                rotation: *angles,
                translation: Vector3::zeros(),
            },
            ActionKind::MoveBy(delta) => ActionDelta {
                rotation: Vector3::zeros(),
                translation: *delta,
            },
            ActionKind::Wait | ActionKind::RepeatForever(_) => ActionDelta::zero(),
            ActionKind::Sequence(actions) => actions
                .iter()
                .fold(ActionDelta::zero(), |acc, a| acc + a.total()),
        }
    }

    /// 时间区间 `[from, to]`（相对动作起点）内产生的增量。
    pub fn delta_between(&self, from: f32, to: f32) -> ActionDelta {
        if to <= from {
            return ActionDelta::zero();
        }
        match &self.kind {
            ActionKind::RepeatForever(inner) => repeat_delta(inner, from, to),
            ActionKind::Sequence(actions) => {
                let mut sum = ActionDelta::zero();
                let mut start = 0.0;
                for action in actions {
                    let end = start + action.duration;
                    if to > start && from < end {
                        sum += action.delta_between(from - start, to - start);
                    } else if from == start && action.duration == 0.0 && to > start {
                        sum += action.total();
                    }
                    start = end;
                    if start >= to {
                        break;
                    }
                }
                sum
            }
            _ => self.accumulated(to) - self.accumulated(from),
        }
    }

    /// 从起点到时刻 `t` 的累计增量（仅用于有限时长的基础动作）。
    fn accumulated(&self, t: f32) -> ActionDelta {
        if t <= 0.0 {
            return ActionDelta::zero();
        }
        if self.duration <= 0.0 || t >= self.duration {
            return self.total();
        }
        self.total().scaled(t / self.duration)
    }
}

/// 把无限重复动作在 `[from, to]` 区间内的增量拆成整周期与首尾残段。
fn repeat_delta(inner: &Action, from: f32, to: f32) -> ActionDelta {
    let period = inner.duration;
    if !(period.is_finite() && period > f32::EPSILON) {
        return ActionDelta::zero();
    }

    let start_cycle = (from / period).floor();
    let end_cycle = (to / period).floor();
    let local_from = from - start_cycle * period;
    let local_to = to - end_cycle * period;

    if start_cycle == end_cycle {
        return inner.delta_between(local_from, local_to);
    }

    let full_cycles = end_cycle - start_cycle - 1.0;
    inner.delta_between(local_from, period)
        + inner.total().scaled(full_cycles)
        + inner.delta_between(0.0, local_to)
}

/// 挂在节点上、正在执行的动作。
#[derive(Debug, Clone)]
pub struct RunningAction {
    action: Action,
    elapsed: f32,
}

impl RunningAction {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            elapsed: 0.0,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// 推进 `delta` 秒并返回这段时间内的增量。
    pub fn step(&mut self, delta: f32) -> ActionDelta {
        if delta <= 0.0 {
            return ActionDelta::zero();
        }
        let from = self.elapsed;
        let to = from + delta;
        let produced = self.action.delta_between(from, to);
        self.elapsed = to;

        // 无限重复的动作把已流逝时间折回一个周期内，避免长时间运行后精度下降
        if let ActionKind::RepeatForever(inner) = &self.action.kind
            && inner.duration.is_finite()
            && inner.duration > f32::EPSILON
        {
            self.elapsed %= inner.duration;
        }
        produced
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.action.duration
    }
}
