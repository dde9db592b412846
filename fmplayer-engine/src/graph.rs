use anyhow::{Context, Result};
use flume::Receiver;
use fmplayer_messages::FramePublisher;
use log::info;
use rustradio::blocks::{MultiplyConst, QuadratureDemod, Tee};
use rustradio::graph::GraphRunner;
use rustradio::mtgraph::MTGraph;

use crate::audio::AudioSink;
use crate::blocks::{ChannelFilterBlock, DemodBlock, IqFileSource, ResamplerBlock, StageRunner};
use crate::config::PipelineConfig;
use crate::dsp::{ChannelFilter, FmDemodulator, Resampler, SpectrumAnalyzer};
use crate::sinks::{AudioOutSink, SpectrumSink};
use crate::source::FileIqSource;
use crate::throttle::{Pacer, Throttle};

/// The player graph plus the channel its source reports read errors on.
pub struct PlayerGraph {
    pub graph: MTGraph,
    pub read_errors: Receiver<rustradio::Error>,
}

/// Build the player graph for a validated configuration.
///
/// ```text
/// file -> [throttle] -> tee -> channel -> quad demod -> audio filter -> resampler -> volume -> audio
///                          \-> spectrum
/// ```
///
/// Every block runs on its own thread, so a block that reaches end of
/// stream is dropped and closes its output for the next one.
pub fn build_graph(
    config: &PipelineConfig,
    audio_sink: Box<dyn AudioSink>,
    publisher: FramePublisher,
) -> Result<PlayerGraph> {
    let reader = FileIqSource::open(&config.input_path)
        .with_context(|| format!("opening recording {}", config.input_path.display()))?;

    let ratio = config.resample_ratio();
    info!(
        "{} at {} S/s, {} with offset {} Hz, volume {}",
        config.label, config.input_rate, config.demod, config.frequency_offset, config.volume
    );
    info!(
        "Rates: quadrature {} S/s, demod audio {} S/s, output {} S/s (ratio {}/{})",
        config.quadrature_rate(),
        config.demod_audio_rate(),
        config.audio_rate,
        ratio.num,
        ratio.den
    );

    let mut graph = MTGraph::new();
    let (failure, read_errors) = flume::bounded(1);

    let (source, prev) = IqFileSource::new(reader, config.input_path.clone(), failure);
    graph.add(Box::new(source));

    let prev = if config.throttle {
        let (throttle, prev) = Throttle::new(prev, Pacer::new(config.input_rate));
        graph.add(Box::new(throttle));
        prev
    } else {
        prev
    };

    let (tee, audio_branch, spectrum_branch) = Tee::new(prev);
    graph.add(Box::new(tee));

    graph.add(Box::new(SpectrumSink::new(
        spectrum_branch,
        SpectrumAnalyzer::from_config(config),
        publisher,
    )));

    let (channel, prev) = ChannelFilterBlock::new(
        audio_branch,
        StageRunner::new(ChannelFilter::from_config(config)),
    );
    graph.add(Box::new(channel));

    let (quad, prev) = QuadratureDemod::new(prev, config.quadrature_gain());
    graph.add(Box::new(quad));

    let (demod, prev) = DemodBlock::new(prev, StageRunner::new(FmDemodulator::from_config(config)));
    graph.add(Box::new(demod));

    let (resampler, prev) = ResamplerBlock::new(prev, StageRunner::new(Resampler::new(ratio)));
    graph.add(Box::new(resampler));

    let (volume, prev) = MultiplyConst::new(prev, config.volume);
    graph.add(Box::new(volume));

    graph.add(Box::new(AudioOutSink::new(prev, audio_sink)));

    Ok(PlayerGraph { graph, read_errors })
}
