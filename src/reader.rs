/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/reader.rs

    Reading whole disks: the per-track retry loop and the heuristics that
    guess the number of sides, the stepping and the number of tracks of a
    disk as it is read.
*/

use std::{
    fmt::{self, Display, Formatter},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    decode::{media::MediaEncoding, AttemptOutcome, DecoderOptions, ReadAttempt},
    dmk::{header::DmkHeader, image::DmkImage, track::DmkTrack, DMK_MAX_SIDES, DMK_MAX_TRACKS},
    gw::protocol::DriveControl,
    merge::merge_sectors,
    types::{DiskStats, DmkEncoding, DmkOptions, TrackStats},
    DmkFluxError,
    Result,
};

/// The track count assumed while guessing the number of tracks.
pub const GUESS_TRACKS: usize = DMK_MAX_TRACKS;
pub const DEFAULT_RETRIES: u32 = 4;
/// Index-to-index revolutions captured per read.
pub const DEFAULT_READ_REVS: u16 = 1;

/// How a disk is read: its geometry, how hard to retry, and which geometry guesses to make.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadPolicy {
    pub tracks: usize,
    pub sides: usize,
    /// Head steps per track: 1, or 2 to read a 40 track disk in an 80 track drive.
    pub steps: u8,
    pub guess_tracks: bool,
    pub guess_sides: bool,
    pub guess_steps: bool,
    /// Retries of a track with errors.
    pub retries: u32,
    /// Retries of every track, even without errors.
    pub min_retries: u32,
    /// Retry a track with fewer good sectors than this.
    pub min_sectors: u32,
    /// Restart single-sided when track 0 looks like two incompatible formats.
    pub check_compat_sides: bool,
    /// With double stepping, bit 0 reads the odd cylinders, and bit 1 alternates between odd
    /// and even cylinders on retries.
    pub alternate: u8,
    pub reverse_sides: bool,
}

impl Default for ReadPolicy {
    fn default() -> Self {
        ReadPolicy {
            tracks: GUESS_TRACKS,
            sides: DMK_MAX_SIDES,
            steps: 1,
            guess_tracks: true,
            guess_sides: true,
            guess_steps: true,
            retries: DEFAULT_RETRIES,
            min_retries: 0,
            min_sectors: 0,
            check_compat_sides: true,
            alternate: 0,
            reverse_sides: false,
        }
    }
}

impl ReadPolicy {
    /// A policy for a disk of known geometry.
    pub fn fixed(tracks: usize, sides: usize, steps: u8) -> Self {
        ReadPolicy {
            tracks: tracks.min(DMK_MAX_TRACKS),
            sides: sides.clamp(1, DMK_MAX_SIDES),
            steps: steps.clamp(1, 2),
            guess_tracks: false,
            guess_sides: false,
            guess_steps: false,
            ..Default::default()
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RestartReason {
    /// The sides of track 0 hold incompatible formats; read single-sided.
    IncompatibleSides,
    /// The second side has no sectors; read single-sided.
    SingleSided,
    /// An odd track has no sectors; read again with double stepping.
    DoubleStep,
    /// Double stepping skips cylinders; read again with single stepping.
    SingleStep,
}

impl RestartReason {
    /// Returns true if the disk must be read again from the start. A change to single-sided
    /// reading carries on with the next track.
    pub fn rereads(&self) -> bool {
        matches!(self, RestartReason::DoubleStep | RestartReason::SingleStep)
    }
}

impl Display for RestartReason {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            RestartReason::IncompatibleSides => write!(f, "incompatible formats detected between sides"),
            RestartReason::SingleSided => write!(f, "apparently single-sided"),
            RestartReason::DoubleStep => write!(f, "double-stepping apparently needed"),
            RestartReason::SingleStep => write!(f, "single-stepping apparently needed"),
        }
    }
}

/// What to do after a read of a track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttemptResult {
    /// The track is done; go on to the next.
    Continue,
    /// Read the track again.
    Retry,
    /// The disk geometry has changed.
    Restart(RestartReason),
    /// The disk has only this many tracks, or the read was cancelled.
    Stop(usize),
}

/// Decides after each read of a track whether to retry, move on, restart or stop. The
/// controller holds the read policy, which its geometry guesses update as the disk is read.
#[derive(Debug)]
pub struct RetryController {
    policy: ReadPolicy,
    cancel: Arc<AtomicBool>,
    /// The cylinder of the last good sector of the previous track.
    cyl_prev_seen: Option<u8>,
    /// The data length of the last good sector of the previous track.
    prev_secsize: Option<usize>,
    flippy: bool,
}

impl RetryController {
    pub fn new(policy: ReadPolicy) -> Self {
        RetryController {
            policy,
            cancel: Arc::new(AtomicBool::new(false)),
            cyl_prev_seen: None,
            prev_secsize: None,
            flippy: false,
        }
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn policy(&self) -> &ReadPolicy {
        &self.policy
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Forget the previous track, before reading a disk from the start.
    pub fn reset(&mut self) {
        self.cyl_prev_seen = None;
        self.prev_secsize = None;
        self.flippy = false;
    }

    /// The last track evaluated looked like the back of a flippy disk.
    pub fn flippy(&self) -> bool {
        self.flippy
    }

    /// The cylinder to seek to for a read of `track`.
    pub fn head_position(&self, track: usize, retry: u32) -> u8 {
        let mut pos = track * self.policy.steps as usize;
        if self.policy.steps == 2 {
            pos += (self.policy.alternate & 1) as usize;
            if retry > 0 && self.policy.alternate & 2 != 0 {
                pos ^= 1;
            }
        }
        pos as u8
    }

    /// The physical head for a side.
    pub fn head(&self, side: usize) -> u8 {
        side as u8 ^ self.policy.reverse_sides as u8
    }

    /// Evaluate a read of a track. `stats` are the statistics of the merged track so far, and
    /// `outcome` is the latest read.
    pub fn evaluate(
        &mut self,
        track: usize,
        side: usize,
        retry: u32,
        stats: &TrackStats,
        outcome: &AttemptOutcome,
    ) -> AttemptResult {
        if self.is_cancelled() || outcome.cancelled {
            log::debug!("RetryController::evaluate(): read cancelled at track {}", track);
            return AttemptResult::Stop(track);
        }

        let good = stats.good_sectors;

        self.flippy = track == 0
            && side == 1
            && good == 0
            && outcome.backward_am >= 9
            && outcome.backward_am > stats.errcount;
        if self.flippy {
            log::warn!(
                "RetryController::evaluate(): {} backward address marks; possibly a flippy disk",
                outcome.backward_am
            );
        }

        let p = &mut self.policy;

        if p.check_compat_sides
            && p.sides == 2
            && track == 0
            && side == 1
            && good > 0
            && self.prev_secsize != Some(512)
            && outcome.secsize == Some(512)
        {
            p.sides = 1;
            return self.restart(RestartReason::IncompatibleSides);
        }

        if p.guess_sides && side == 1 {
            p.guess_sides = false;
            if good == 0 {
                p.sides = 1;
                return self.restart(RestartReason::SingleSided);
            }
        }

        if p.guess_steps {
            if track == 3 {
                p.guess_steps = false;
            }

            if p.steps == 1 {
                if track & 1 == 1 && good == 0 {
                    p.guess_steps = false;
                    p.steps = 2;
                    if p.guess_tracks {
                        p.tracks = GUESS_TRACKS / 2;
                    }
                    return self.restart(RestartReason::DoubleStep);
                }
            }
            else if good > 0 && track > 0 && outcome.cyl_seen.map(usize::from) == Some(track * 2) {
                p.steps = 1;
                if p.guess_tracks {
                    p.tracks = GUESS_TRACKS;
                }
                return self.restart(RestartReason::SingleStep);
            }
        }

        if p.guess_tracks
            && (track == 35 || track >= 40)
            && (good == 0
                || (side == 0 && outcome.cyl_seen == self.cyl_prev_seen)
                || (side == 0 && track >= 80 && outcome.cyl_seen.map(usize::from) == Some(track / 2)))
        {
            log::debug!("RetryController::evaluate(): apparently only {} tracks", track);
            return AttemptResult::Stop(track);
        }

        let failing = (stats.errcount > 0 || retry < p.min_retries || good < p.min_sectors) && retry < p.retries;
        if failing {
            log::debug!(
                "RetryController::evaluate(): track {} side {} pass {}: {} good, {} errors",
                track,
                side,
                retry + 1,
                good,
                stats.errcount
            );
            return AttemptResult::Retry;
        }

        self.cyl_prev_seen = outcome.cyl_seen;
        self.prev_secsize = outcome.secsize;
        AttemptResult::Continue
    }

    fn restart(&self, reason: RestartReason) -> AttemptResult {
        log::debug!("RetryController::evaluate(): {}", reason);
        AttemptResult::Restart(reason)
    }
}

/// The final result of reading one track.
#[derive(Clone, Debug)]
pub struct TrackRead {
    pub track: DmkTrack,
    pub stats: TrackStats,
    pub retries: u32,
    pub result: AttemptResult,
    pub flippy: bool,
    /// The drive speed measured during the last read.
    pub rpm: Option<f64>,
}

/// Reads a disk through a drive into a DMK image, retrying and merging the reads of each
/// track.
pub struct DiskReader<D: DriveControl> {
    drive: D,
    controller: RetryController,
    opts: DecoderOptions,
    media: MediaEncoding,
    revs: u16,
    stats: DiskStats,
}

impl<D: DriveControl> DiskReader<D> {
    pub fn new(drive: D, policy: ReadPolicy, opts: DecoderOptions, media: MediaEncoding) -> Self {
        DiskReader {
            drive,
            controller: RetryController::new(policy),
            opts,
            media,
            revs: DEFAULT_READ_REVS,
            stats: DiskStats::default(),
        }
    }

    pub fn with_revs(mut self, revs: u16) -> Self {
        self.revs = revs.max(1);
        self
    }

    pub fn controller(&self) -> &RetryController {
        &self.controller
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.controller.cancel_flag()
    }

    pub fn stats(&self) -> &DiskStats {
        &self.stats
    }

    pub fn drive_mut(&mut self) -> &mut D {
        &mut self.drive
    }

    pub fn into_inner(self) -> D {
        self.drive
    }

    /// Read one track, retrying until the controller is satisfied.
    pub fn read_track(&mut self, track: usize, side: usize) -> Result<TrackRead> {
        if side >= DMK_MAX_SIDES || track >= DMK_MAX_TRACKS {
            return Err(DmkFluxError::ParameterError(format!(
                "track {} side {} out of range",
                track, side
            )));
        }

        let mut best = DmkTrack::default();
        let mut best_stats = TrackStats::new();
        let mut retry = 0;

        loop {
            let cyl = self.controller.head_position(track, retry);
            self.drive.seek(cyl)?;
            self.drive.head(self.controller.head(side))?;

            let mut opts = self.opts.clone();
            opts.rx02_seen |= self.stats.enc_count_total[DmkEncoding::Rx02.idx()] > 0;

            let stream = self.drive.read_flux(self.revs, 0)?;
            let mut attempt = ReadAttempt::new(&opts, self.media).with_cancel(self.controller.cancel_flag());
            attempt.feed_stream(&stream)?;
            let outcome = attempt.finish();

            let (merged, merged_stats) = merge_sectors(&best, &best_stats, &outcome.track, &outcome.stats);
            best = merged;
            best_stats = merged_stats;

            let result = self.controller.evaluate(track, side, retry, &best_stats, &outcome);
            if result == AttemptResult::Retry {
                retry += 1;
                continue;
            }

            log::debug!(
                "DiskReader::read_track(): track {} side {}: {} good sectors{}, {} errors, {:?}",
                track,
                side,
                best_stats.good_sectors,
                if best_stats.reused_sectors > 0 {
                    format!(" ({} reused)", best_stats.reused_sectors)
                }
                else {
                    String::new()
                },
                best_stats.errcount,
                result
            );

            return Ok(TrackRead {
                track: best,
                stats: best_stats,
                retries: retry,
                result,
                flippy: self.controller.flippy(),
                rpm: outcome.rpm(self.drive.sample_freq()),
            });
        }
    }

    fn new_image(&self) -> DmkImage {
        let policy = self.controller.policy();
        let mut header = DmkHeader::new(0, self.opts.capacity.min(u16::MAX as usize) as u16);
        header.quirks = self.opts.quirks;
        header.options.set(DmkOptions::SINGLE_SIDED, policy.sides == 1);
        header.options.set(DmkOptions::SINGLE_DENSITY, self.opts.single_density);
        header.options.set(DmkOptions::RX02, self.opts.encoding == DmkEncoding::Rx02);

        let mut image = DmkImage::new(header);
        image.set_track_ct(policy.tracks);
        image
    }

    /// Read the disk. The motor is turned off afterward whether or not the read succeeded.
    pub fn read_disk(&mut self) -> Result<DmkImage> {
        self.drive.motor(true)?;
        let result = self.read_disk_inner();
        let motor = self.drive.motor(false);
        let image = result?;
        motor?;
        Ok(image)
    }

    fn read_disk_inner(&mut self) -> Result<DmkImage> {
        'restart: loop {
            self.stats = DiskStats::default();
            self.controller.reset();

            let policy = self.controller.policy().clone();
            log::debug!(
                "DiskReader::read_disk(): trying {} side(s), {} tracks, {} stepping",
                policy.sides,
                policy.tracks,
                if policy.steps == 1 { "single" } else { "double" }
            );

            let mut image = self.new_image();
            let mut sides = policy.sides;

            for t in 0..policy.tracks {
                let mut s = 0;
                while s < sides {
                    let read = self.read_track(t, s)?;
                    match read.result {
                        AttemptResult::Restart(reason) if reason.rereads() => continue 'restart,
                        AttemptResult::Restart(_) => {
                            sides = self.controller.policy().sides;
                            image.set_single_sided(true);
                        }
                        AttemptResult::Stop(tracks) => {
                            image.set_track_ct(tracks);
                            self.log_summary();
                            return Ok(image);
                        }
                        AttemptResult::Continue | AttemptResult::Retry => {
                            image.set_track(t, s, read.track)?;
                            self.stats.add_track(&read.stats, read.retries, read.flippy);
                        }
                    }
                    s += 1;
                }
            }

            self.log_summary();
            return Ok(image);
        }
    }

    fn log_summary(&self) {
        let s = &self.stats;
        log::debug!(
            "DiskReader::read_disk(): {} good tracks, {} good sectors ({} FM + {} MFM + {} RX02)",
            s.good_tracks,
            s.good_sectors_total,
            s.enc_count_total[DmkEncoding::Fm.idx()],
            s.enc_count_total[DmkEncoding::Mfm.idx()],
            s.enc_count_total[DmkEncoding::Rx02.idx()]
        );
        log::debug!(
            "DiskReader::read_disk(): {} bad tracks, {} unrecovered errors, {} retries",
            s.err_tracks,
            s.errcount_total,
            s.retries_total
        );
        if s.flippy {
            log::warn!("DiskReader::read_disk(): possibly a flippy disk; check the reverse side too");
        }
    }
}
