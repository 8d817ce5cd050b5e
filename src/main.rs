mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use cli::{Cli, Command};
use fierifiction::core::config::Config;
use fierifiction::core::io::{NativeStorage, Storage};
use fierifiction::core::random::{Chooser, ThreadRngChooser};
use fierifiction::services::blog::tumblr::TumblrClient;
use fierifiction::services::llm::create_text_generator;
use fierifiction::services::media::ffmpeg::FfmpegTools;
use fierifiction::services::media::MediaAssembler;
use fierifiction::services::moderation::{Moderator, WordListModerator};
use fierifiction::services::music::spotify::SpotifyClient;
use fierifiction::services::music::{MusicCatalog, SongFinder};
use fierifiction::services::tts::{create_speech_synthesizer, Prosody, VoiceSelector};
use fierifiction::services::workflow::Publisher;

fn build_assembler(
    config: &Config,
    storage: Arc<dyn Storage>,
    chooser: Arc<dyn Chooser>,
) -> Result<MediaAssembler> {
    let synthesizer = create_speech_synthesizer(&config.audio)?;
    let voices = VoiceSelector::new(
        synthesizer.clone(),
        chooser.clone(),
        &config.audio.language,
        config.audio.voice.clone(),
    );

    let catalog = config
        .music
        .spotify
        .clone()
        .map(|spotify| Arc::new(SpotifyClient::new(spotify)) as Arc<dyn MusicCatalog>);
    let songs = SongFinder::new(catalog, storage.clone(), chooser, config.music.clone());

    Ok(MediaAssembler::new(
        Arc::new(FfmpegTools::new(config.media.clone())),
        storage,
        synthesizer,
        voices,
        songs,
    )
    .with_voice_count(config.audio.voice_count)
    .with_prosody(Prosody::from(&config.audio.voice)))
}

fn build_publisher(config: Config, assembler: Option<MediaAssembler>) -> Result<Publisher> {
    let generator = create_text_generator(&config.llm)?;

    let moderator: Option<Box<dyn Moderator>> = if config.moderation.enabled {
        let path = config
            .moderation
            .word_list
            .as_ref()
            .context("moderation.word_list is required when moderation is enabled")?;
        Some(Box::new(WordListModerator::from_file(path)?))
    } else {
        None
    };

    let blog = Box::new(TumblrClient::new(&config.blog.token));
    Ok(Publisher::new(config, generator, moderator, blog, assembler))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Error loading config: {:#}", e);
            return Err(e);
        }
    };

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    let chooser: Arc<dyn Chooser> = Arc::new(ThreadRngChooser);

    match cli.command {
        Command::Voices => {
            let synthesizer = create_speech_synthesizer(&config.audio)?;
            let voices = synthesizer.list_voices(&config.audio.language).await?;
            for voice in voices {
                println!(
                    "{}\t{}\t{}\t{}",
                    voice.short_name,
                    voice.gender,
                    voice.locale,
                    voice.style_list.join(",")
                );
            }
        }
        Command::Assemble(args) => {
            let assembler = build_assembler(&config, storage, chooser)?;
            assembler
                .assemble_video(&args.image, &args.audio, &args.output)
                .await?;
            assembler
                .add_soundtrack(&args.image, &args.output, "", args.loop_file.as_deref())
                .await?;
            info!("Video written to {}", args.output.display());
        }
        Command::Video(args) => {
            let assembler = build_assembler(&config, storage, chooser)?;
            let publisher = build_publisher(config, Some(assembler))?;
            let outcome = publisher.post_video(&args.into_request()).await?;
            info!("Done: {:?}", outcome);
        }
        Command::Text(args) => {
            let publisher = build_publisher(config, None)?;
            let outcome = publisher.post_text(&args.into_request()).await?;
            info!("Done: {:?}", outcome);
        }
    }

    Ok(())
}
