//! Registration of an ordered frame sequence against its first frame.
//!
//! The first frame is the anchor and receives the identity transform. Every
//! later frame is registered against a short list of candidate anchors:
//!
//! 1. the sequence anchor itself,
//! 2. then up to `retries` of the most recently *successfully* registered
//!    frames, most recent first.
//!
//! The first candidate that registers wins and the frame's transform is the
//! pairwise transform chained onto that candidate's own transform. Frames
//! that fail against every candidate produce a failure outcome and are never
//! used as anchors for later frames. A failure never stops the sequence.

use log::{debug, info, warn};
use rand::Rng;

use crate::point::Locatable2d;
use crate::registrar::{PointSetRegistrar, RegistrationConfig, RegistrationError};
use crate::transform::RigidTransform;

/// A frame that was placed in the anchor's coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisteredFrame {
    /// Maps anchor (reference) coordinates to this frame's coordinates.
    pub transform: RigidTransform,

    /// Index of the frame whose stars this frame was registered against.
    /// Equal to the frame's own index for the anchor.
    pub anchor_index: usize,
}

/// The outcome for one input frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOutcome {
    /// Position of the frame in the input sequence.
    pub index: usize,

    pub result: Result<RegisteredFrame, RegistrationError>,
}

impl RegistrationOutcome {
    pub fn is_registered(&self) -> bool {
        self.result.is_ok()
    }

    /// The anchor→frame transform if registration succeeded.
    pub fn transform(&self) -> Option<&RigidTransform> {
        self.result.as_ref().ok().map(|frame| &frame.transform)
    }
}

/// A successfully registered frame kept as a potential anchor.
struct Anchor<'a, P> {
    index: usize,
    points: &'a [P],
    transform: RigidTransform,
}

/// Drives a [`PointSetRegistrar`] across an ordered sequence of point sets.
#[derive(Debug, Clone, Default)]
pub struct SequenceRegistrar {
    registrar: PointSetRegistrar,
}

impl SequenceRegistrar {
    pub fn new(config: RegistrationConfig) -> Self {
        Self {
            registrar: PointSetRegistrar::new(config),
        }
    }

    pub fn registrar(&self) -> &PointSetRegistrar {
        &self.registrar
    }

    /// Lazily register `frames`, yielding exactly one outcome per frame in
    /// input order.
    pub fn outcomes<'a, P, I, G>(&'a self, frames: I, rng: G) -> Outcomes<'a, P, I::IntoIter, G>
    where
        P: Locatable2d + 'a,
        I: IntoIterator<Item = &'a [P]>,
        G: Rng,
    {
        Outcomes {
            registrar: &self.registrar,
            frames: frames.into_iter(),
            rng,
            registered: Vec::new(),
            next_index: 0,
        }
    }

    /// Eagerly register `frames`.
    pub fn register_sequence<'a, P, I, G>(&'a self, frames: I, rng: G) -> Vec<RegistrationOutcome>
    where
        P: Locatable2d + 'a,
        I: IntoIterator<Item = &'a [P]>,
        G: Rng,
    {
        let outcomes: Vec<_> = self.outcomes(frames, rng).collect();
        let registered = outcomes.iter().filter(|o| o.is_registered()).count();
        info!(
            "registered {} / {} frames against the anchor",
            registered,
            outcomes.len()
        );
        outcomes
    }
}

/// Lazy outcome stream returned by [`SequenceRegistrar::outcomes`].
pub struct Outcomes<'a, P, I, G> {
    registrar: &'a PointSetRegistrar,
    frames: I,
    rng: G,
    registered: Vec<Anchor<'a, P>>,
    next_index: usize,
}

impl<'a, P, I, G> Outcomes<'a, P, I, G>
where
    P: Locatable2d + 'a,
    I: Iterator<Item = &'a [P]>,
    G: Rng,
{
    /// Indices into `registered`: the sequence anchor, then the most recent
    /// successes (most recent first), never repeating the anchor.
    fn candidate_anchors(&self) -> Vec<usize> {
        let retries = self.registrar.config().retries;
        let mut candidates = Vec::with_capacity(retries + 1);
        candidates.push(0);
        candidates.extend((1..self.registered.len()).rev().take(retries));
        candidates
    }

    fn register_frame(&mut self, index: usize, points: &'a [P]) -> RegistrationOutcome {
        let candidates = self.candidate_anchors();

        for &candidate in &candidates {
            let anchor = &self.registered[candidate];
            match self.registrar.register(anchor.points, points, &mut self.rng) {
                Ok(registration) => {
                    // anchor -> candidate, then candidate -> this frame
                    let transform = registration.transform.compose(&anchor.transform);
                    let anchor_index = anchor.index;
                    debug!("frame {index} registered against frame {anchor_index}: {transform}");

                    self.registered.push(Anchor {
                        index,
                        points,
                        transform,
                    });
                    return RegistrationOutcome {
                        index,
                        result: Ok(RegisteredFrame {
                            transform,
                            anchor_index,
                        }),
                    };
                }
                Err(err) => {
                    debug!("frame {index} against frame {}: {err}", anchor.index);
                }
            }
        }

        warn!(
            "failed to register frame {index} against {} candidate anchors",
            candidates.len()
        );
        RegistrationOutcome {
            index,
            result: Err(RegistrationError::AnchorsExhausted {
                attempts: candidates.len(),
            }),
        }
    }
}

impl<'a, P, I, G> Iterator for Outcomes<'a, P, I, G>
where
    P: Locatable2d + 'a,
    I: Iterator<Item = &'a [P]>,
    G: Rng,
{
    type Item = RegistrationOutcome;

    fn next(&mut self) -> Option<RegistrationOutcome> {
        let points = self.frames.next()?;
        let index = self.next_index;
        self.next_index += 1;

        if self.registered.is_empty() {
            let transform = RigidTransform::identity();
            self.registered.push(Anchor {
                index,
                points,
                transform,
            });
            return Some(RegistrationOutcome {
                index,
                result: Ok(RegisteredFrame {
                    transform,
                    anchor_index: index,
                }),
            });
        }

        Some(self.register_frame(index, points))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.frames.size_hint()
    }
}
