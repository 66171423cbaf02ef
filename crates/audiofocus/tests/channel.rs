//! Async consumption of interrupt events.

use audiofocus::{
    ArbitratorConfig, AudioManager, AudioRendererOptions, ContentType, InterruptHint,
    InterruptMode, InterruptType, StreamUsage,
};
use std::time::Duration;

fn manager() -> AudioManager {
    AudioManager::new(ArbitratorConfig::default().with_default_mode(InterruptMode::Independent))
}

#[tokio::test]
async fn test_channel_sees_pause_and_resume() {
    let manager = manager();
    let music = manager
        .create_audio_renderer(AudioRendererOptions::new(ContentType::Music, StreamUsage::Media))
        .unwrap();
    let call = manager
        .create_audio_renderer(AudioRendererOptions::new(
            ContentType::Speech,
            StreamUsage::VoiceCommunication,
        ))
        .unwrap();
    let mut rx = music.interrupt_events().unwrap();

    music.start().unwrap();
    call.start().unwrap();
    call.stop().unwrap();

    let begin = rx.recv().await.unwrap();
    assert_eq!((begin.event_type, begin.hint_type), (InterruptType::Begin, InterruptHint::Pause));
    let end = rx.recv().await.unwrap();
    assert_eq!((end.event_type, end.hint_type), (InterruptType::End, InterruptHint::Resume));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_channel_consumer_task() {
    let manager = manager();
    let music = manager
        .create_audio_renderer(AudioRendererOptions::new(ContentType::Music, StreamUsage::Media))
        .unwrap();
    let alarm = manager
        .create_audio_renderer(AudioRendererOptions::new(ContentType::Music, StreamUsage::Alarm))
        .unwrap();
    let mut rx = music.interrupt_events().unwrap();

    let consumer = tokio::spawn(async move {
        let mut hints = Vec::new();
        while let Some(event) = rx.recv().await {
            hints.push(event.hint_type);
        }
        hints
    });

    music.start().unwrap();
    alarm.start().unwrap();
    alarm.release().unwrap();
    // Releasing the listening session closes its channel
    music.release().unwrap();

    let hints = tokio::time::timeout(Duration::from_secs(5), consumer)
        .await
        .expect("consumer did not finish")
        .unwrap();
    assert_eq!(hints, vec![InterruptHint::Duck, InterruptHint::Unduck]);
}

#[tokio::test]
async fn test_off_interrupt_closes_channel() {
    let manager = manager();
    let music = manager
        .create_audio_renderer(AudioRendererOptions::new(ContentType::Music, StreamUsage::Media))
        .unwrap();
    let mut rx = music.interrupt_events().unwrap();
    music.off_interrupt();
    assert!(rx.recv().await.is_none());
}
