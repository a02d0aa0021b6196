// ==========================================
// Composite MES - Autoclave batch optimizer
// ==========================================
// Packs curing-eligible orders into one autoclave bed using first-fit-
// decreasing over shelf rows (2-D footprint, single bin per invocation).
// Proposal generation is read-only and lock-free: nothing about an order
// changes until a human confirms the proposal through the batch lifecycle.
//
// Determinism: candidates are sorted by descending footprint area, then
// descending priority, then ascending order number. No randomized
// tie-breaks anywhere, so identical inputs always produce the identical
// placement list (required for reproducible fixtures).
// ==========================================

use crate::config::config_manager::WorkflowConfigReader;
use crate::domain::batch::{Autoclave, CuringCycle};
use crate::domain::order::Order;
use crate::engine::error::EngineResult;
use crate::engine::routing;
use crate::repository::order_repo::OrderRepository;
use crate::repository::reference_repo::{AutoclaveRepository, CuringCycleRepository};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

// ==========================================
// PlacementRejection
// ==========================================
// Why an order was left unplaced. Not an error: unplaced orders are part
// of the proposal, reported, never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlacementRejection {
    /// No free rectangular space left on the bed.
    ExceedsFootprint,
    VacuumLinesExhausted { requested: i32, remaining: i32 },
    IncompatibleCuringCycle { order_cycle: Option<String> },
    MissingDimensions,
}

impl fmt::Display for PlacementRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementRejection::ExceedsFootprint => write!(f, "CAPACITY_EXCEEDED: footprint"),
            PlacementRejection::VacuumLinesExhausted {
                requested,
                remaining,
            } => write!(
                f,
                "CAPACITY_EXCEEDED: vacuum lines (requested {requested}, remaining {remaining})"
            ),
            PlacementRejection::IncompatibleCuringCycle { order_cycle } => {
                write!(f, "INCOMPATIBLE_CYCLE: {order_cycle:?}")
            }
            PlacementRejection::MissingDimensions => write!(f, "MISSING_DIMENSIONS"),
        }
    }
}

// ==========================================
// Proposal types
// ==========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedPlacement {
    pub order_number: String,
    pub x_mm: f64,
    pub y_mm: f64,
    pub length_mm: f64,
    pub width_mm: f64,
    pub rotated: bool,
    pub vacuum_lines: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnplacedOrder {
    pub order_number: String,
    pub reason: PlacementRejection,
}

/// An unconfirmed optimization result. The proposal id is a session-scoped
/// token; nothing is persisted until confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProposal {
    pub proposal_id: String,
    pub autoclave_code: String,
    pub curing_cycle_code: String,
    pub placements: Vec<ProposedPlacement>,
    pub unplaced: Vec<UnplacedOrder>,
    pub utilization_pct: f64,
    /// Configured target; reported for the operator to judge, never a gate.
    pub utilization_target_pct: f64,
    pub total_area_mm2: f64,
    pub generated_at: DateTime<Utc>,
}

impl BatchProposal {
    /// Plain-text layout rendering for dashboards and logs.
    pub fn layout_text(&self) -> String {
        let mut out = format!(
            "load {} on {} (cycle {}): {:.1}% of bed\n",
            self.proposal_id, self.autoclave_code, self.curing_cycle_code, self.utilization_pct
        );
        for p in &self.placements {
            out.push_str(&format!(
                "  {} at ({:.0},{:.0}) {:.0}x{:.0}mm{}\n",
                p.order_number,
                p.x_mm,
                p.y_mm,
                p.length_mm,
                p.width_mm,
                if p.rotated { " (rotated)" } else { "" }
            ));
        }
        for u in &self.unplaced {
            out.push_str(&format!("  unplaced {}: {}\n", u.order_number, u.reason));
        }
        out
    }
}

// ==========================================
// Shelf packer
// ==========================================
// Rows stacked along the bed width; parts laid left to right along the
// bed length. First fit: the earliest shelf with room wins.
struct Shelf {
    y_mm: f64,
    height_mm: f64,
    used_length_mm: f64,
}

struct ShelfPacker {
    bed_length_mm: f64,
    bed_width_mm: f64,
    shelves: Vec<Shelf>,
}

impl ShelfPacker {
    fn new(bed_length_mm: f64, bed_width_mm: f64) -> Self {
        Self {
            bed_length_mm,
            bed_width_mm,
            shelves: Vec::new(),
        }
    }

    fn used_width(&self) -> f64 {
        self.shelves.iter().map(|s| s.height_mm).sum()
    }

    /// Place an l x w part; tries the given orientation first, then the
    /// rotation. Returns (x, y, length, width, rotated).
    fn try_place(&mut self, length_mm: f64, width_mm: f64) -> Option<(f64, f64, f64, f64, bool)> {
        for (l, w, rotated) in [
            (length_mm, width_mm, false),
            (width_mm, length_mm, true),
        ] {
            if let Some((x, y)) = self.try_place_oriented(l, w) {
                return Some((x, y, l, w, rotated));
            }
        }
        None
    }

    fn try_place_oriented(&mut self, l: f64, w: f64) -> Option<(f64, f64)> {
        if l > self.bed_length_mm || w > self.bed_width_mm {
            return None;
        }
        for shelf in &mut self.shelves {
            if w <= shelf.height_mm && shelf.used_length_mm + l <= self.bed_length_mm {
                let x = shelf.used_length_mm;
                shelf.used_length_mm += l;
                return Some((x, shelf.y_mm));
            }
        }
        // Open a new shelf if the remaining bed width allows it.
        let y = self.used_width();
        if y + w <= self.bed_width_mm {
            self.shelves.push(Shelf {
                y_mm: y,
                height_mm: w,
                used_length_mm: l,
            });
            return Some((0.0, y));
        }
        None
    }
}

// ==========================================
// BatchOptimizer
// ==========================================

pub struct BatchOptimizer<C>
where
    C: WorkflowConfigReader,
{
    order_repo: Arc<OrderRepository>,
    autoclave_repo: Arc<AutoclaveRepository>,
    cycle_repo: Arc<CuringCycleRepository>,
    config: Arc<C>,
}

impl<C> BatchOptimizer<C>
where
    C: WorkflowConfigReader,
{
    pub fn new(
        order_repo: Arc<OrderRepository>,
        autoclave_repo: Arc<AutoclaveRepository>,
        cycle_repo: Arc<CuringCycleRepository>,
        config: Arc<C>,
    ) -> Self {
        Self {
            order_repo,
            autoclave_repo,
            cycle_repo,
            config,
        }
    }

    /// Pack the curing-eligible order pool for one autoclave and cycle.
    /// Zero side effects on orders.
    #[instrument(skip(self), fields(autoclave = %autoclave_code, cycle = %cycle_code))]
    pub async fn propose(
        &self,
        autoclave_code: &str,
        cycle_code: &str,
    ) -> EngineResult<BatchProposal> {
        let autoclave = self.autoclave_repo.require_active(autoclave_code)?;
        let cycle = self.cycle_repo.require(cycle_code)?;
        let settings = self.config.optimizer_settings().await?;

        let candidates = self
            .order_repo
            .list_by_statuses(&routing::curing_eligible_statuses())?;

        let cycles_by_code: HashMap<String, CuringCycle> = self
            .cycle_repo
            .list()?
            .into_iter()
            .map(|c| (c.code.clone(), c))
            .collect();

        let proposal = pack(
            &autoclave,
            &cycle,
            &cycles_by_code,
            candidates,
            settings.utilization_target_pct,
        );
        info!(
            placed = proposal.placements.len(),
            unplaced = proposal.unplaced.len(),
            utilization = proposal.utilization_pct,
            "proposal generated"
        );
        Ok(proposal)
    }
}

/// Pure packing pass, separated from I/O for deterministic tests.
pub fn pack(
    autoclave: &Autoclave,
    cycle: &CuringCycle,
    cycles_by_code: &HashMap<String, CuringCycle>,
    mut candidates: Vec<Order>,
    utilization_target_pct: f64,
) -> BatchProposal {
    // FFD sort: area desc, priority desc, order number asc.
    candidates.sort_by(|a, b| {
        let area_a = a.footprint_area_mm2().unwrap_or(0.0);
        let area_b = b.footprint_area_mm2().unwrap_or(0.0);
        area_b
            .total_cmp(&area_a)
            .then(b.priority.cmp(&a.priority))
            .then(a.order_number.cmp(&b.order_number))
    });

    let mut packer = ShelfPacker::new(autoclave.bed_length_mm, autoclave.bed_width_mm);
    let mut placements = Vec::new();
    let mut unplaced = Vec::new();
    let mut remaining_lines = autoclave.vacuum_lines;
    let mut placed_area = 0.0;

    for order in candidates {
        let compatible = match &order.curing_cycle_code {
            Some(code) if code == &cycle.code => true,
            Some(code) => cycles_by_code
                .get(code)
                .map(|c| c.compatibility_key == cycle.compatibility_key)
                .unwrap_or(false),
            None => false,
        };
        if !compatible {
            unplaced.push(UnplacedOrder {
                order_number: order.order_number,
                reason: PlacementRejection::IncompatibleCuringCycle {
                    order_cycle: order.curing_cycle_code,
                },
            });
            continue;
        }

        let (length, width) = match (order.length_mm, order.width_mm) {
            (Some(l), Some(w)) if l > 0.0 && w > 0.0 => (l, w),
            _ => {
                unplaced.push(UnplacedOrder {
                    order_number: order.order_number,
                    reason: PlacementRejection::MissingDimensions,
                });
                continue;
            }
        };

        if order.vacuum_lines > remaining_lines {
            unplaced.push(UnplacedOrder {
                order_number: order.order_number,
                reason: PlacementRejection::VacuumLinesExhausted {
                    requested: order.vacuum_lines,
                    remaining: remaining_lines,
                },
            });
            continue;
        }

        match packer.try_place(length, width) {
            Some((x, y, l, w, rotated)) => {
                remaining_lines -= order.vacuum_lines;
                placed_area += l * w;
                placements.push(ProposedPlacement {
                    order_number: order.order_number,
                    x_mm: x,
                    y_mm: y,
                    length_mm: l,
                    width_mm: w,
                    rotated,
                    vacuum_lines: order.vacuum_lines,
                });
            }
            None => {
                unplaced.push(UnplacedOrder {
                    order_number: order.order_number,
                    reason: PlacementRejection::ExceedsFootprint,
                });
            }
        }
    }

    let usable = autoclave.usable_area_mm2();
    let utilization_pct = if usable > 0.0 {
        (placed_area / usable * 10_000.0).round() / 100.0
    } else {
        0.0
    };

    BatchProposal {
        proposal_id: Uuid::new_v4().to_string(),
        autoclave_code: autoclave.code.clone(),
        curing_cycle_code: cycle.code.clone(),
        placements,
        unplaced,
        utilization_pct,
        utilization_target_pct,
        total_area_mm2: placed_area,
        generated_at: Utc::now(),
    }
}
