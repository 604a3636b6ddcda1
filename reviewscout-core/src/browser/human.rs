use std::time::Duration;

use rand::{thread_rng, Rng};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::HumanSection;

use super::session::ScrapeSession;

/// One planned scroll movement. Plans are sampled up front so no RNG handle
/// is held across an await point.
#[derive(Debug, Clone)]
struct ScrollStep {
    amount: u32,
    smooth: bool,
    pause_ms: (u64, u64),
    reading_pause_ms: Option<(u64, u64)>,
}

#[derive(Debug, Clone)]
struct ScrollPlan {
    steps: Vec<ScrollStep>,
    scroll_back: Option<(u32, (u64, u64))>,
}

/// Randomized timing and scroll behavior inserted between automated actions.
/// Timing is a pure primitive. Scrolling is best-effort: a failure is logged
/// and the pipeline continues with whatever content already loaded.
#[derive(Debug, Clone)]
pub struct Humanizer {
    config: HumanSection,
}

impl Humanizer {
    pub fn new(config: HumanSection) -> Self {
        Self { config }
    }

    /// Suspend for a uniformly sampled duration within the given bounds.
    pub async fn delay(&self, min_ms: u64, max_ms: u64) {
        let millis = {
            let mut rng = thread_rng();
            let lower = min_ms.min(max_ms);
            let upper = min_ms.max(max_ms);
            rng.gen_range(lower..=upper)
        };
        sleep(Duration::from_millis(millis)).await;
    }

    /// Short pause between interaction steps.
    pub async fn pause(&self) {
        let [min, max] = self.config.action_pause_ms;
        self.delay(min, max).await;
    }

    /// Longer pause after a navigation, letting dynamic content hydrate.
    pub async fn settle(&self) {
        let [min, max] = self.config.page_settle_ms;
        self.delay(min, max).await;
    }

    /// Backoff between navigation retry attempts.
    pub async fn backoff(&self) {
        let [min, max] = self.config.nav_backoff_ms;
        self.delay(min, max).await;
    }

    /// Perform 1..=max_scrolls randomized scroll steps, alternating smooth
    /// and instant styles, with occasional reading pauses and a probabilistic
    /// partial scroll-back at the end.
    pub async fn scroll(&self, session: &mut dyn ScrapeSession, max_scrolls: u32) {
        let plan = self.plan_scroll(max_scrolls);
        let steps = plan.steps.len();
        for step in &plan.steps {
            let script = if step.smooth {
                format!(
                    "window.scrollBy({{ top: {}, behavior: 'smooth' }});",
                    step.amount
                )
            } else {
                format!("window.scrollBy(0, {});", step.amount)
            };
            if let Err(err) = session.evaluate(&script).await {
                warn!(error = %err, "scroll step failed, continuing with loaded content");
                return;
            }
            self.delay(step.pause_ms.0, step.pause_ms.1).await;
            if let Some((min, max)) = step.reading_pause_ms {
                self.delay(min, max).await;
            }
        }
        if let Some((back, (min, max))) = plan.scroll_back {
            let script = format!("window.scrollBy(0, -{back});");
            if let Err(err) = session.evaluate(&script).await {
                warn!(error = %err, "scroll-back failed, continuing with loaded content");
                return;
            }
            self.delay(min, max).await;
        }
        debug!(steps, "performed humanized scroll");
    }

    fn plan_scroll(&self, max_scrolls: u32) -> ScrollPlan {
        let mut rng = thread_rng();
        let [step_min, step_max] = self.config.scroll_step_px;
        let count = rng.gen_range(1..=max_scrolls.max(1));
        let mut steps = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let smooth = rng.gen_bool(0.5);
            let pause_ms = if smooth {
                let [min, max] = self.config.smooth_scroll_pause_ms;
                (min, max)
            } else {
                let [min, max] = self.config.instant_scroll_pause_ms;
                (min, max)
            };
            let reading_pause_ms = if rng.gen_bool(0.3) {
                let [min, max] = self.config.reading_pause_ms;
                Some((min, max))
            } else {
                None
            };
            steps.push(ScrollStep {
                amount: rng.gen_range(step_min..=step_max.max(step_min)),
                smooth,
                pause_ms,
                reading_pause_ms,
            });
        }
        let scroll_back = if rng.gen_bool(0.2) {
            let [back_min, back_max] = self.config.scroll_back_px;
            let [pause_min, pause_max] = self.config.scroll_back_pause_ms;
            Some((
                rng.gen_range(back_min..=back_max.max(back_min)),
                (pause_min, pause_max),
            ))
        } else {
            None
        };
        ScrollPlan { steps, scroll_back }
    }
}
