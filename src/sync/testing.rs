//! In-memory gateway with a scripted server, for coordinator tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{error::RemoteError, gateway::RemoteGateway};
use crate::{
    model::{DailyAggregate, InventoryItem},
    tracking::dto::{CheckInRequest, CheckInResponse, LogNutritionResponse, LogWaterResponse},
};

enum Outcome {
    Succeed,
    Fail(RemoteError),
    /// The server applies the mutation but the reply never arrives.
    LoseReply,
}

struct Step {
    gate: Option<oneshot::Receiver<()>>,
    outcome: Outcome,
    /// Apply the server effect when the gate opens instead of on arrival.
    on_release: bool,
}

struct Server {
    date: String,
    day: Option<DailyAggregate>,
    items: HashMap<String, InventoryItem>,
}

impl Server {
    fn day_mut(&mut self) -> &mut DailyAggregate {
        let date = self.date.clone();
        self.day.get_or_insert_with(|| DailyAggregate::empty(date))
    }
}

/// Mutations take the next scripted step in call order; with no step queued
/// they succeed immediately. By default the server state changes when a call
/// arrives, before its gate is awaited, so replies can be released out of
/// order. Steps queued with [`ScriptedGateway::applied_on_release`] change the
/// server only when released, so the server can process calls in a different
/// order than the client sent them.
pub(crate) struct ScriptedGateway {
    server: Mutex<Server>,
    steps: Mutex<VecDeque<Step>>,
    mutation_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub(crate) fn new(date: &str, day: Option<DailyAggregate>) -> Self {
        Self {
            server: Mutex::new(Server {
                date: date.to_string(),
                day,
                items: HashMap::new(),
            }),
            steps: Mutex::new(VecDeque::new()),
            mutation_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_item(self, item: InventoryItem) -> Self {
        self.server
            .lock()
            .unwrap()
            .items
            .insert(item.id.clone(), item);
        self
    }

    /// Server files check-ins under `date` from now on.
    pub(crate) fn move_server_day(&self, date: &str) {
        self.server.lock().unwrap().date = date.to_string();
    }

    fn push(&self, outcome: Outcome, gated: bool) -> Option<oneshot::Sender<()>> {
        let (tx, rx) = oneshot::channel();
        self.steps.lock().unwrap().push_back(Step {
            gate: gated.then_some(rx),
            outcome,
            on_release: false,
        });
        gated.then_some(tx)
    }

    /// Next call reaches the server, and succeeds, only once the returned
    /// sender fires.
    pub(crate) fn applied_on_release(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.steps.lock().unwrap().push_back(Step {
            gate: Some(rx),
            outcome: Outcome::Succeed,
            on_release: true,
        });
        tx
    }

    /// Next call succeeds once the returned sender fires.
    pub(crate) fn gated_success(&self) -> oneshot::Sender<()> {
        self.push(Outcome::Succeed, true).unwrap()
    }

    /// Next call fails with `err` once the returned sender fires.
    pub(crate) fn gated_failure(&self, err: RemoteError) -> oneshot::Sender<()> {
        self.push(Outcome::Fail(err), true).unwrap()
    }

    pub(crate) fn fail_next(&self, err: RemoteError) {
        self.push(Outcome::Fail(err), false);
    }

    pub(crate) fn lose_next_reply(&self) {
        self.push(Outcome::LoseReply, false);
    }

    pub(crate) fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn server_day(&self) -> Option<DailyAggregate> {
        self.server.lock().unwrap().day.clone()
    }

    fn resolve<T>(
        &self,
        outcome: &Outcome,
        effect: impl FnOnce(&mut Server) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        match outcome {
            Outcome::Fail(err) => Err(err.clone()),
            Outcome::Succeed | Outcome::LoseReply => effect(&mut self.server.lock().unwrap()),
        }
    }

    /// Runs one mutation: applies `effect` to the server unless the step fails,
    /// and waits for the gate before replying.
    async fn run<T>(
        &self,
        effect: impl FnOnce(&mut Server) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step {
            gate: None,
            outcome: Outcome::Succeed,
            on_release: false,
        });
        let Step {
            gate,
            outcome,
            on_release,
        } = step;

        let mut effect = Some(effect);
        let mut result = None;
        if !on_release {
            result = effect.take().map(|f| self.resolve(&outcome, f));
        }

        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let result = match (result, effect.take()) {
            (Some(result), _) => result,
            (None, Some(f)) => self.resolve(&outcome, f),
            (None, None) => unreachable!("effect runs exactly once"),
        };
        if let Outcome::LoseReply = outcome {
            std::future::pending::<()>().await;
        }
        result
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn log_water(&self, amount_ml: u32) -> Result<LogWaterResponse, RemoteError> {
        self.run(|server| {
            let day = server.day_mut();
            day.water_total += amount_ml;
            Ok(LogWaterResponse {
                success: true,
                updated_water_total: day.water_total,
            })
        })
        .await
    }

    async fn log_nutrition(
        &self,
        item_id: &str,
        quantity: f64,
    ) -> Result<LogNutritionResponse, RemoteError> {
        self.run(|server| {
            let item = server
                .items
                .get(item_id)
                .cloned()
                .ok_or_else(|| RemoteError::Status {
                    status: 404,
                    message: "Item not found".into(),
                })?;
            let delta = item.macros_for(quantity);
            let day = server.day_mut();
            day.protein_total += delta.protein_total;
            day.carbs_total += delta.carbs_total;
            day.fats_total += delta.fats_total;
            day.calories_total += delta.calories_total;
            Ok(LogNutritionResponse {
                success: true,
                daily_totals: day.macros(),
            })
        })
        .await
    }

    async fn upsert_check_in(
        &self,
        request: &CheckInRequest,
    ) -> Result<CheckInResponse, RemoteError> {
        let request = request.clone();
        self.run(move |server| {
            let date = server.date.clone();
            let day = server.day_mut();
            if day.date != date {
                *day = DailyAggregate::empty(date);
            }
            if let Some(w) = request.weight {
                day.weight = Some(w);
            }
            if let Some(h) = request.sleep_hours {
                day.sleep_hours = Some(h);
            }
            if let Some(b) = request.bloated {
                day.bloated = b;
            }
            let id = *day.check_in_id.get_or_insert_with(Uuid::new_v4);
            Ok(CheckInResponse {
                id,
                weight: day.weight,
                sleep_hours: day.sleep_hours,
                bloated: day.bloated,
                date: day.date.clone(),
            })
        })
        .await
    }

    async fn fetch_day(&self, date: &str) -> Result<Option<DailyAggregate>, RemoteError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .server
            .lock()
            .unwrap()
            .day
            .clone()
            .filter(|day| day.date == date))
    }
}
